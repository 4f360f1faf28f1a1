//! Shared helpers for building blocks and CAR files in tests

#![allow(dead_code)]

use cid::Cid;
use dotstorage_dag::block::{DAG_CBOR_CODE, DAG_PB_CODE, RAW_CODE};
use dotstorage_dag::{Block, BlockSource, MemoryBlockSource, SourceChain};
use libipld::cbor::DagCborCodec;
use libipld::codec::Codec;
use libipld::pb::DagPbCodec;
use libipld::{ipld, Ipld};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Opaque leaf block
pub fn raw(data: &[u8]) -> Block {
    Block::encode(RAW_CODE, data.to_vec())
}

/// UnixFS-style node linking to `children` in order
pub fn pb_node(children: &[Cid]) -> Block {
    let links: Vec<Ipld> = children
        .iter()
        .enumerate()
        .map(|(i, cid)| ipld!({ "Hash": *cid, "Name": format!("{:04}", i), "Tsize": 0 }))
        .collect();
    let node = ipld!({ "Links": Ipld::List(links) });
    Block::encode(DAG_PB_CODE, DagPbCodec.encode(&node).unwrap())
}

/// DAG-CBOR value holding `children` as a list of links
pub fn cbor_node(children: &[Cid]) -> Block {
    let links = Ipld::List(children.iter().map(|cid| Ipld::Link(*cid)).collect());
    let value = ipld!({ "links": links });
    Block::encode(DAG_CBOR_CODE, DagCborCodec.encode(&value).unwrap())
}

pub fn memory_source(name: &str, blocks: &[Block]) -> Arc<dyn BlockSource> {
    Arc::new(MemoryBlockSource::with_blocks(name, blocks.iter().cloned()))
}

pub fn single_source_chain(blocks: &[Block]) -> SourceChain {
    SourceChain::new(vec![memory_source("memory", blocks)])
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Write a CARv1 file holding `blocks` under the given roots
pub fn write_car(roots: &[Cid], blocks: &[Block]) -> NamedTempFile {
    let roots = Ipld::List(roots.iter().map(|cid| Ipld::Link(*cid)).collect());
    let header = DagCborCodec
        .encode(&ipld!({ "version": 1, "roots": roots }))
        .unwrap();

    let mut out = Vec::new();
    write_varint(&mut out, header.len() as u64);
    out.extend_from_slice(&header);
    for block in blocks {
        let cid = block.cid.to_bytes();
        write_varint(&mut out, (cid.len() + block.data.len()) as u64);
        out.extend_from_slice(&cid);
        out.extend_from_slice(&block.data);
    }

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&out).unwrap();
    file.flush().unwrap();
    file
}
