//! Magic-byte type sniffing backed by the `infer` crate.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::{ProbeError, SniffedType, TypeSniffer};

// infer only needs the signature bytes at the head of the file.
const SNIFF_BYTES: usize = 8192;

#[derive(Debug, Default, Clone)]
pub struct MagicSniffer;

impl TypeSniffer for MagicSniffer {
    fn sniff(&self, path: &Path) -> Result<Option<SniffedType>, ProbeError> {
        let mut file = File::open(path)?;
        let mut buf = vec![0u8; SNIFF_BYTES];
        let n = file.read(&mut buf)?;
        Ok(infer::get(&buf[..n]).map(|kind| SniffedType {
            mime: kind.mime_type().to_string(),
            ext: kind.extension().to_string(),
        }))
    }
}
