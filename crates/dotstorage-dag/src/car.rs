/*!
# Indexed CAR Reader

Serves blocks out of a CARv1 archive on disk. Opening the file reads the
DAG-CBOR header and scans every section once to build an in-memory index of
payload offsets; lookups then seek straight to the payload.

A CARv1 file is `varint(len) | header` followed by sections of the form
`varint(len) | CID | payload`, where `len` covers the CID and the payload.
*/

use crate::source::BlockSource;
use crate::{Block, SourceError, SourceResult};
use async_trait::async_trait;
use cid::Cid;
use libipld::cbor::DagCborCodec;
use libipld::codec::Codec;
use libipld::Ipld;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Longest unsigned varint accepted (63 bits of payload)
const MAX_VARINT_LEN: usize = 9;

/// Upper bound on the encoded size of a CID. Enough for a 64 byte digest
/// plus version, codec and multihash prefixes.
const MAX_CID_LEN: u64 = 96;

/// Upper bound on the header size
const MAX_HEADER_LEN: u64 = 1 << 20;

/// Where a block's payload sits in the file
#[derive(Debug, Clone, Copy)]
struct BlockLocation {
    offset: u64,
    length: usize,
}

/// Block source backed by an indexed CARv1 file
pub struct CarBlockSource {
    name: String,
    path: PathBuf,
    roots: Vec<Cid>,
    index: HashMap<Cid, BlockLocation>,
    file: Mutex<File>,
}

impl CarBlockSource {
    /// Open a CAR file and index its blocks
    pub async fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let file_len = file.metadata().await?.len();
        let mut reader = BufReader::new(file);

        let (header_len, prefix_len) = read_varint(&mut reader)
            .await?
            .ok_or_else(|| SourceError::InvalidCar("empty file".to_string()))?;
        if header_len == 0 || header_len > MAX_HEADER_LEN {
            return Err(SourceError::InvalidCar(format!(
                "invalid header length {}",
                header_len
            )));
        }

        let mut header = vec![0u8; header_len as usize];
        read_exact(&mut reader, &mut header).await?;
        let roots = parse_header(&header)?;

        let mut index = HashMap::new();
        let mut offset = prefix_len as u64 + header_len;

        while let Some((section_len, varint_len)) = read_varint(&mut reader).await? {
            offset += varint_len as u64;
            if section_len == 0 {
                return Err(SourceError::InvalidCar(format!(
                    "empty section at offset {}",
                    offset
                )));
            }
            if offset + section_len > file_len {
                return Err(SourceError::InvalidCar(format!(
                    "truncated section at offset {}",
                    offset
                )));
            }

            let mut cid_bytes = vec![0u8; section_len.min(MAX_CID_LEN) as usize];
            read_exact(&mut reader, &mut cid_bytes).await?;
            let cid = Cid::read_bytes(cid_bytes.as_slice())?;
            let cid_len = cid.encoded_len() as u64;
            if cid_len > section_len {
                return Err(SourceError::InvalidCar(format!(
                    "CID overruns section at offset {}",
                    offset
                )));
            }

            // first occurrence wins when a CAR repeats a block
            index.entry(cid).or_insert(BlockLocation {
                offset: offset + cid_len,
                length: (section_len - cid_len) as usize,
            });

            offset += section_len;
            reader.seek(SeekFrom::Start(offset)).await?;
        }

        info!(
            "Indexed {} blocks and {} roots from {}",
            index.len(),
            roots.len(),
            path.display()
        );

        Ok(Self {
            name: path.display().to_string(),
            path,
            roots,
            index,
            file: Mutex::new(reader.into_inner()),
        })
    }

    /// Roots listed in the CAR header, in header order
    pub fn roots(&self) -> &[Cid] {
        &self.roots
    }

    /// Path the source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the archive holds a block
    pub fn contains(&self, cid: &Cid) -> bool {
        self.index.contains_key(cid)
    }

    /// Number of distinct blocks in the archive
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the archive holds no blocks
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[async_trait]
impl BlockSource for CarBlockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, cid: &Cid) -> SourceResult<Option<Block>> {
        let location = match self.index.get(cid) {
            Some(location) => *location,
            None => return Ok(None),
        };

        let mut data = vec![0u8; location.length];
        {
            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(location.offset)).await?;
            file.read_exact(&mut data).await?;
        }
        debug!("Read {} bytes for {} from {}", data.len(), cid, self.name);

        Ok(Some(Block::new(*cid, data)))
    }
}

/// Decode the `{ version, roots }` header
fn parse_header(bytes: &[u8]) -> SourceResult<Vec<Cid>> {
    let header: Ipld = DagCborCodec
        .decode(bytes)
        .map_err(|e| SourceError::InvalidCar(format!("malformed header: {}", e)))?;

    let fields = match header {
        Ipld::Map(fields) => fields,
        _ => return Err(SourceError::InvalidCar("header is not a map".to_string())),
    };

    match fields.get("version") {
        Some(Ipld::Integer(1)) => {}
        Some(Ipld::Integer(version)) => {
            return Err(SourceError::InvalidCar(format!(
                "unsupported CAR version {}",
                version
            )))
        }
        _ => return Err(SourceError::InvalidCar("header has no version".to_string())),
    }

    match fields.get("roots") {
        Some(Ipld::List(roots)) => roots
            .iter()
            .map(|root| match root {
                Ipld::Link(cid) => Ok(*cid),
                _ => Err(SourceError::InvalidCar("root is not a CID".to_string())),
            })
            .collect(),
        _ => Err(SourceError::InvalidCar("header has no roots".to_string())),
    }
}

/// Read an unsigned LEB128 varint, returning the value and its encoded length.
/// `None` signals a clean end of input before the first byte.
async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> SourceResult<Option<(u64, usize)>> {
    let mut value: u64 = 0;

    for i in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte).await? == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(SourceError::InvalidCar("truncated varint".to_string()));
        }

        value |= u64::from(byte[0] & 0x7f) << (7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    Err(SourceError::InvalidCar("varint too long".to_string()))
}

async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> SourceResult<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(SourceError::InvalidCar("unexpected end of file".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{DAG_CBOR_CODE, RAW_CODE};
    use libipld::ipld;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_varint(out: &mut Vec<u8>, mut value: u64) {
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    fn car_bytes(header: &Ipld, blocks: &[Block]) -> Vec<u8> {
        let header = DagCborCodec.encode(header).unwrap();
        let mut out = Vec::new();
        write_varint(&mut out, header.len() as u64);
        out.extend_from_slice(&header);

        for block in blocks {
            let cid = block.cid.to_bytes();
            write_varint(&mut out, (cid.len() + block.data.len()) as u64);
            out.extend_from_slice(&cid);
            out.extend_from_slice(&block.data);
        }
        out
    }

    fn write_car(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_open_and_get() {
        let a = Block::encode(RAW_CODE, b"alpha".to_vec());
        let b = Block::encode(RAW_CODE, vec![7u8; 300]);
        let root = Block::encode(
            DAG_CBOR_CODE,
            DagCborCodec.encode(&ipld!([a.cid, b.cid])).unwrap(),
        );
        let header = ipld!({ "version": 1, "roots": [root.cid, a.cid] });
        let file = write_car(&car_bytes(&header, &[root.clone(), a.clone(), b.clone()]));

        let car = CarBlockSource::open(file.path()).await.unwrap();
        assert_eq!(car.roots(), &[root.cid, a.cid]);
        assert_eq!(car.len(), 3);
        assert!(car.contains(&b.cid));

        // out of file order on purpose
        assert_eq!(car.get(&b.cid).await.unwrap(), Some(b));
        assert_eq!(car.get(&root.cid).await.unwrap(), Some(root));
        assert_eq!(car.get(&a.cid).await.unwrap(), Some(a));

        let absent = Block::encode(RAW_CODE, b"absent".to_vec());
        assert_eq!(car.get(&absent.cid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_roots_and_blocks() {
        let header = ipld!({ "version": 1, "roots": [] });
        let file = write_car(&car_bytes(&header, &[]));

        let car = CarBlockSource::open(file.path()).await.unwrap();
        assert!(car.roots().is_empty());
        assert!(car.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unsupported_version() {
        let header = ipld!({ "version": 2, "roots": [] });
        let file = write_car(&car_bytes(&header, &[]));

        match CarBlockSource::open(file.path()).await {
            Err(SourceError::InvalidCar(msg)) => assert!(msg.contains("version 2")),
            other => panic!("expected invalid CAR, got {:?}", other.map(|c| c.len())),
        }
    }

    #[tokio::test]
    async fn test_rejects_truncated_section() {
        let block = Block::encode(RAW_CODE, b"cut short".to_vec());
        let header = ipld!({ "version": 1, "roots": [block.cid] });
        let mut bytes = car_bytes(&header, &[block]);
        bytes.truncate(bytes.len() - 3);
        let file = write_car(&bytes);

        assert!(matches!(
            CarBlockSource::open(file.path()).await,
            Err(SourceError::InvalidCar(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CarBlockSource::open(dir.path().join("nope.car")).await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_varint() {
        let mut encoded = Vec::new();
        write_varint(&mut encoded, 300);
        assert_eq!(encoded, vec![0xac, 0x02]);

        let mut reader = encoded.as_slice();
        assert_eq!(read_varint(&mut reader).await.unwrap(), Some((300, 2)));
        assert_eq!(read_varint(&mut reader).await.unwrap(), None);

        let mut truncated: &[u8] = &[0x80];
        assert!(read_varint(&mut truncated).await.is_err());
    }
}
