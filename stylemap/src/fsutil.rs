use crate::error::Error;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

pub(crate) fn open(path: &Path) -> Result<BufReader<File>> {
  File::open(path).map(BufReader::new).map_err(Error::io(path))
}

/// Create `path` for writing, creating missing parent directories first.
pub(crate) fn create(path: &Path) -> Result<BufWriter<File>> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).map_err(Error::io(parent))?;
  }
  File::create(path).map(BufWriter::new).map_err(Error::io(path))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  Ok(serde_json::from_reader(open(path)?)?)
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  let mut out = create(path)?;
  serde_json::to_writer(&mut out, value)?;
  out.flush().map_err(Error::io(path))
}

pub(crate) fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
  Ok(bincode::deserialize_from(open(path)?)?)
}

pub(crate) fn write_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  let mut out = create(path)?;
  bincode::serialize_into(&mut out, value)?;
  out.flush().map_err(Error::io(path))
}
