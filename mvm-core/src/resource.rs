//! Resource fork codec.
//!
//! Serializes a set of typed, numbered resources into the classic
//! resource-fork binary layout: a 16-byte header, a data section of
//! length-prefixed blobs starting at offset 0x100, and a resource map
//! with a type list and per-type reference lists. Resource names are
//! not supported; every name-list offset is written as 0xFFFF.

use std::collections::BTreeMap;

use crate::error::{LaunchError, LaunchResult};
use crate::volume::FourCC;

const DATA_OFFSET: usize = 0x100;
/// Fixed distance from the start of the map to the type list.
const TYPE_LIST_OFFSET: usize = 28;

/// An in-memory resource fork: `(type, id) -> raw bytes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFork {
    resources: BTreeMap<(FourCC, i16), Vec<u8>>,
}

impl ResourceFork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource.
    pub fn add(&mut self, kind: FourCC, id: i16, data: Vec<u8>) {
        self.resources.insert((kind, id), data);
    }

    pub fn get(&self, kind: FourCC, id: i16) -> Option<&[u8]> {
        self.resources.get(&(kind, id)).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Decode a resource fork. An empty byte stream decodes to an empty
    /// fork; anything else must carry a well-formed header and map.
    pub fn parse(bytes: &[u8]) -> LaunchResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }

        let u32_at = |off: usize| -> LaunchResult<u32> {
            let s = bytes
                .get(off..off + 4)
                .ok_or_else(|| LaunchError::ResourceFork(format!("truncated at {}", off)))?;
            Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
        };
        let u16_at = |off: usize| -> LaunchResult<u16> {
            let s = bytes
                .get(off..off + 2)
                .ok_or_else(|| LaunchError::ResourceFork(format!("truncated at {}", off)))?;
            Ok(u16::from_be_bytes([s[0], s[1]]))
        };

        let data_off = u32_at(0)? as usize;
        let map_off = u32_at(4)? as usize;
        let data_len = u32_at(8)? as usize;
        if data_off + data_len > bytes.len() || map_off >= bytes.len() {
            return Err(LaunchError::ResourceFork(
                "header offsets out of bounds".into(),
            ));
        }

        let type_list = map_off + u16_at(map_off + 24)? as usize;
        let n_types = u16_at(type_list)?.wrapping_add(1) as usize;

        let mut fork = Self::new();
        for t in 0..n_types {
            let entry = type_list + 2 + t * 8;
            let kind_bytes = bytes
                .get(entry..entry + 4)
                .ok_or_else(|| LaunchError::ResourceFork("type list truncated".into()))?;
            let kind = FourCC([kind_bytes[0], kind_bytes[1], kind_bytes[2], kind_bytes[3]]);
            let count = u16_at(entry + 4)?.wrapping_add(1) as usize;
            let ref_list = type_list + u16_at(entry + 6)? as usize;

            for r in 0..count {
                let re = ref_list + r * 12;
                let id = u16_at(re)? as i16;
                // Byte 4 is the attribute byte; the following three bytes
                // are the offset of the length word in the data section.
                let attr_and_off = u32_at(re + 4)?;
                let res_off = data_off + (attr_and_off & 0x00FF_FFFF) as usize;
                let res_len = u32_at(res_off)? as usize;
                let data = bytes
                    .get(res_off + 4..res_off + 4 + res_len)
                    .ok_or_else(|| {
                        LaunchError::ResourceFork(format!("resource {} #{} truncated", kind, id))
                    })?;
                fork.add(kind, id, data.to_vec());
            }
        }
        Ok(fork)
    }

    /// Encode to the on-disk layout. Deterministic: resources are laid
    /// out in (type, id) order.
    pub fn encode(&self) -> Vec<u8> {
        // Data section, remembering each resource's offset.
        let mut data = Vec::new();
        let mut offsets: BTreeMap<(FourCC, i16), u32> = BTreeMap::new();
        for (key, bytes) in &self.resources {
            offsets.insert(*key, data.len() as u32);
            data.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            data.extend_from_slice(bytes);
        }

        // Types in order, with per-type resource counts.
        let mut types: Vec<(FourCC, Vec<i16>)> = Vec::new();
        for (kind, id) in self.resources.keys() {
            match types.last_mut() {
                Some((k, ids)) if k == kind => ids.push(*id),
                _ => types.push((*kind, vec![*id])),
            }
        }

        // Reference lists start right after the type list, measured from
        // the type list's first byte.
        let type_list_len = 2 + types.len() * 8;
        let ref_list_base = type_list_len;
        let n_refs: usize = types.iter().map(|(_, ids)| ids.len()).sum();
        let map_len = TYPE_LIST_OFFSET + type_list_len + n_refs * 12;
        let map_off = DATA_OFFSET + data.len();

        let mut out = vec![0u8; DATA_OFFSET];
        out[0..4].copy_from_slice(&(DATA_OFFSET as u32).to_be_bytes());
        out[4..8].copy_from_slice(&(map_off as u32).to_be_bytes());
        out[8..12].copy_from_slice(&(data.len() as u32).to_be_bytes());
        out[12..16].copy_from_slice(&(map_len as u32).to_be_bytes());
        out.extend_from_slice(&data);

        // Resource map: header copy, handle/refnum/attrs, list offsets.
        let map_start = out.len();
        let mut header_copy = [0u8; 16];
        header_copy.copy_from_slice(&out[0..16]);
        out.extend_from_slice(&header_copy);
        out.extend_from_slice(&[0u8; 8]); // next handle + file ref + attributes
        out.extend_from_slice(&(TYPE_LIST_OFFSET as u16).to_be_bytes());
        out.extend_from_slice(&(map_len as u16).to_be_bytes()); // no name list

        out.extend_from_slice(&((types.len() as u16).wrapping_sub(1)).to_be_bytes());
        let mut next_ref = ref_list_base;
        for (kind, ids) in &types {
            out.extend_from_slice(kind.as_bytes());
            out.extend_from_slice(&((ids.len() as u16).wrapping_sub(1)).to_be_bytes());
            out.extend_from_slice(&(next_ref as u16).to_be_bytes());
            next_ref += ids.len() * 12;
        }
        for (kind, ids) in &types {
            for id in ids {
                out.extend_from_slice(&(*id as u16).to_be_bytes());
                out.extend_from_slice(&0xFFFFu16.to_be_bytes()); // no name
                let off = offsets[&(*kind, *id)];
                out.extend_from_slice(&(off & 0x00FF_FFFF).to_be_bytes()); // attrs 0 + u24 offset
                out.extend_from_slice(&0u32.to_be_bytes()); // handle
            }
        }
        debug_assert_eq!(out.len() - map_start, map_len);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut fork = ResourceFork::new();
        fork.add(FourCC::new(b"vers"), 1, vec![0x07, 0x00, 0x80, 0x00]);
        fork.add(FourCC::new(b"vers"), 2, vec![0x06, 0x08]);
        fork.add(FourCC::new(b"alis"), 0, vec![0u8; 150]);

        let encoded = fork.encode();
        let decoded = ResourceFork::parse(&encoded).unwrap();
        assert_eq!(decoded, fork);
        assert_eq!(
            decoded.get(FourCC::new(b"vers"), 1),
            Some(&[0x07, 0x00, 0x80, 0x00][..])
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let mut a = ResourceFork::new();
        a.add(FourCC::new(b"vers"), 1, vec![1, 2]);
        a.add(FourCC::new(b"alis"), 0, vec![3, 4, 5]);

        let mut b = ResourceFork::new();
        b.add(FourCC::new(b"alis"), 0, vec![3, 4, 5]);
        b.add(FourCC::new(b"vers"), 1, vec![1, 2]);

        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn test_empty_stream_decodes_empty() {
        let fork = ResourceFork::parse(&[]).unwrap();
        assert!(fork.is_empty());
    }

    #[test]
    fn test_truncated_fork_rejected() {
        let mut fork = ResourceFork::new();
        fork.add(FourCC::new(b"vers"), 1, vec![6, 8]);
        let mut encoded = fork.encode();
        encoded.truncate(encoded.len() - 10);
        assert!(ResourceFork::parse(&encoded).is_err());
    }

    #[test]
    fn test_header_layout() {
        let mut fork = ResourceFork::new();
        fork.add(FourCC::new(b"vers"), 1, vec![6, 8]);
        let encoded = fork.encode();

        // Data section at 0x100 holding one length-prefixed resource.
        assert_eq!(&encoded[0..4], &0x100u32.to_be_bytes());
        assert_eq!(&encoded[0x100..0x104], &2u32.to_be_bytes());
        assert_eq!(&encoded[0x104..0x106], &[6, 8]);
    }
}
