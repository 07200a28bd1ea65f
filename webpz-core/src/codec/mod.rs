use crate::error::Result;
use std::io::{Read, Write};

/// ZIP method numbers for the entry codecs we write.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    Store = 0,
    Deflate = 8,
}

impl CodecId {
    pub fn from_method(m: u16) -> Option<Self> {
        match m {
            0 => Some(CodecId::Store),
            8 => Some(CodecId::Deflate),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodecId::Store => "stored",
            CodecId::Deflate => "deflated",
        }
    }
}

pub trait Compressor: Send + Sync {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: u32) -> Result<u64>;
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
}

pub fn compressor_for(id: CodecId) -> Box<dyn Compressor> {
    match id {
        CodecId::Store => Box::new(store::Store),
        CodecId::Deflate => Box::new(deflate::DeflateCompressor),
    }
}

pub mod deflate;
pub mod store;
