use std::{collections::BTreeMap, io};

use crate::{
    Deserialize, Serialize,
    family::{Blob, GradMap, Key, ParamMap},
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

const ACK: Header = 0;
const STEP: Header = 1;
const PARAMS_REQUEST: Header = 2;
const GRADS_UPLOAD: Header = 3;
const PARAMS: Header = 4;

/// The application layer message for the entire system.
///
/// Workers send `Step`, `ParamsRequest` and `GradsUpload` on the aggregation
/// channel, the coordinator answers on the worker's private channel with
/// either `Ack` or `Params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Ack,
    Step { worker: usize },
    ParamsRequest { worker: usize },
    GradsUpload { worker: usize, grads: GradMap },
    Params(ParamMap),
}

impl Msg {
    /// The index of the sending worker, `None` for coordinator replies.
    pub fn worker(&self) -> Option<usize> {
        match self {
            Msg::Step { worker }
            | Msg::ParamsRequest { worker }
            | Msg::GradsUpload { worker, .. } => Some(*worker),
            Msg::Ack | Msg::Params(_) => None,
        }
    }

    /// A short name for the message kind, used for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Ack => "ack",
            Msg::Step { .. } => "step",
            Msg::ParamsRequest { .. } => "params_request",
            Msg::GradsUpload { .. } => "grads_upload",
            Msg::Params(_) => "params",
        }
    }

    fn invalid_data<T>(text: String) -> io::Result<T> {
        Err(io::Error::new(io::ErrorKind::InvalidData, text))
    }
}

impl Serialize for Msg {
    fn serialize(&self, buf: &mut Vec<u8>) {
        let header = match self {
            Msg::Ack => ACK,
            Msg::Step { .. } => STEP,
            Msg::ParamsRequest { .. } => PARAMS_REQUEST,
            Msg::GradsUpload { .. } => GRADS_UPLOAD,
            Msg::Params(_) => PARAMS,
        };

        buf.extend_from_slice(&header.to_be_bytes());

        if let Some(worker) = self.worker() {
            buf.extend_from_slice(&(worker as u64).to_be_bytes());
        }

        match self {
            Msg::GradsUpload { grads, .. } => write_map(grads, buf),
            Msg::Params(params) => write_map(params, buf),
            _ => {}
        }
    }
}

impl Deserialize for Msg {
    fn deserialize(buf: &[u8]) -> io::Result<Self> {
        let mut reader = Reader::new(buf);
        let header = Header::from_be_bytes(reader.take_array::<HEADER_SIZE>()?);

        let msg = match header {
            ACK => Msg::Ack,
            STEP => Msg::Step {
                worker: reader.take_worker()?,
            },
            PARAMS_REQUEST => Msg::ParamsRequest {
                worker: reader.take_worker()?,
            },
            GRADS_UPLOAD => Msg::GradsUpload {
                worker: reader.take_worker()?,
                grads: reader.take_map()?,
            },
            PARAMS => Msg::Params(reader.take_map()?),
            other => return Self::invalid_data(format!("Received an invalid kind header {other}")),
        };

        reader.finish()?;
        Ok(msg)
    }
}

fn write_map<K: Key>(map: &BTreeMap<K, Blob>, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(map.len() as u32).to_be_bytes());

    for (key, blob) in map {
        buf.push(key.to_byte());
        buf.extend_from_slice(&(blob.len() as u64).to_be_bytes());
        buf.extend_from_slice(blob.as_bytes());
    }
}

/// A bounds checked cursor over a frame body.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if self.buf.len() < n {
            return Msg::invalid_data(format!(
                "The given buffer is too small {}, must at least be {n} bytes",
                self.buf.len()
            ));
        }

        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let bytes = self.take(N)?;

        // SAFETY: `take` returned exactly `N` bytes.
        Ok(bytes.try_into().unwrap())
    }

    fn take_worker(&mut self) -> io::Result<usize> {
        let worker = u64::from_be_bytes(self.take_array()?);
        usize::try_from(worker).or_else(|_| Msg::invalid_data(format!("Invalid worker index {worker}")))
    }

    fn take_map<K: Key>(&mut self) -> io::Result<BTreeMap<K, Blob>> {
        let entries = u32::from_be_bytes(self.take_array()?);
        let mut map = BTreeMap::new();

        for _ in 0..entries {
            let [byte] = self.take_array()?;
            let Some(key) = K::from_byte(byte) else {
                return Msg::invalid_data(format!("Received an unknown family key {byte}"));
            };

            let len = u64::from_be_bytes(self.take_array()?) as usize;
            let blob = Blob::new(self.take(len)?.to_vec());

            if map.insert(key, blob).is_some() {
                return Msg::invalid_data(format!("Received a duplicated family key {byte}"));
            }
        }

        Ok(map)
    }

    fn finish(self) -> io::Result<()> {
        match self.buf.len() {
            0 => Ok(()),
            n => Msg::invalid_data(format!("Received {n} trailing bytes")),
        }
    }
}
