use crate::error::Result;
use crate::fsutil;
use flate2::read::MultiGzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// Character substituted for spaces inside multi-word labels, so tokenizers
/// treat "Deep House" as the single token "Deep_House".
pub const SPACER: char = '_';

pub fn to_token(label: &str) -> String {
  label.replace(' ', &SPACER.to_string())
}

pub fn to_display(token: &str) -> String {
  token.replace(SPACER, " ")
}

/// Record element name for a dump's search type ("masters" → "master").
pub fn record_tag(search_type: &str) -> &str {
  search_type.strip_suffix('s').unwrap_or(search_type)
}

/// Tags attached to one catalog record, in document order, as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRecord {
  pub styles: Vec<String>,
  pub genres: Vec<String>,
}

#[derive(Clone, Copy)]
enum Capture {
  Style,
  Genre,
}

/// Streaming reader over the record elements of a catalog dump.
///
/// Only `record/styles/style` and `record/genres/genre` text is kept; every
/// other element is skipped without being buffered. Missing or empty tag
/// elements simply produce shorter lists.
pub struct CatalogReader<R: BufRead> {
  reader: Reader<R>,
  record_tag: Vec<u8>,
  buf: Vec<u8>,
  finished: bool,
}

pub type GzCatalogReader = CatalogReader<BufReader<MultiGzDecoder<BufReader<File>>>>;

impl GzCatalogReader {
  /// Open a gzip-compressed dump.
  pub fn open(path: &Path, record_tag: &str) -> Result<Self> {
    let decoder = MultiGzDecoder::new(fsutil::open(path)?);
    Ok(CatalogReader::from_reader(BufReader::new(decoder), record_tag))
  }
}

impl<R: BufRead> CatalogReader<R> {
  pub fn from_reader(source: R, record_tag: &str) -> Self {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    Self {
      reader,
      record_tag: record_tag.as_bytes().to_vec(),
      buf: Vec::new(),
      finished: false,
    }
  }

  fn read_record(&mut self) -> Result<Option<CatalogRecord>> {
    // Skip to the next record start.
    loop {
      self.buf.clear();
      match self.reader.read_event_into(&mut self.buf)? {
        Event::Start(e) if e.name().as_ref() == self.record_tag.as_slice() => break,
        Event::Eof => return Ok(None),
        _ => {}
      }
    }

    let mut record = CatalogRecord::default();
    // Element names below the record element.
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();
    loop {
      self.buf.clear();
      match self.reader.read_event_into(&mut self.buf)? {
        Event::Start(e) => {
          path.push(e.name().as_ref().to_vec());
          text.clear();
        }
        Event::Text(t) => {
          if capture_at(&path).is_some() {
            text.push_str(&t.unescape()?);
          }
        }
        Event::CData(t) => {
          if capture_at(&path).is_some() {
            text.push_str(&String::from_utf8_lossy(&t));
          }
        }
        Event::End(_) => {
          if path.is_empty() {
            return Ok(Some(record));
          }
          let value = text.trim();
          match capture_at(&path) {
            Some(Capture::Style) if !value.is_empty() => record.styles.push(value.to_string()),
            Some(Capture::Genre) if !value.is_empty() => record.genres.push(value.to_string()),
            _ => {}
          }
          text.clear();
          path.pop();
        }
        Event::Eof => {
          debug!("dump ended inside a record; dropping it");
          return Ok(None);
        }
        _ => {}
      }
    }
  }
}

fn capture_at(path: &[Vec<u8>]) -> Option<Capture> {
  match path {
    [parent, leaf] if parent == b"styles" && leaf == b"style" => Some(Capture::Style),
    [parent, leaf] if parent == b"genres" && leaf == b"genre" => Some(Capture::Genre),
    _ => None,
  }
}

impl<R: BufRead> Iterator for CatalogReader<R> {
  type Item = Result<CatalogRecord>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    match self.read_record() {
      Ok(Some(record)) => Some(Ok(record)),
      Ok(None) => {
        self.finished = true;
        None
      }
      Err(err) => {
        self.finished = true;
        Some(Err(err))
      }
    }
  }
}

/// A restartable source of token sequences for embedding training.
///
/// Each call to `sentences` starts a fresh pass from the beginning, so a
/// trainer can run several epochs without holding the corpus in memory.
pub trait SentenceSource {
  fn sentences(&self) -> Result<Box<dyn Iterator<Item = Result<Vec<String>>> + '_>>;
}

impl SentenceSource for [Vec<String>] {
  fn sentences(&self) -> Result<Box<dyn Iterator<Item = Result<Vec<String>>> + '_>> {
    Ok(Box::new(self.iter().cloned().map(Ok)))
  }
}

impl SentenceSource for Vec<Vec<String>> {
  fn sentences(&self) -> Result<Box<dyn Iterator<Item = Result<Vec<String>>> + '_>> {
    self.as_slice().sentences()
  }
}

/// Style co-occurrence documents read lazily from a compressed dump.
///
/// A document is the style list of one record, with spaces replaced by
/// [`SPACER`]. Records with fewer than two styles carry no co-occurrence
/// signal and are skipped.
#[derive(Debug, Clone)]
pub struct StyleCorpus {
  path: PathBuf,
  record_tag: String,
}

impl StyleCorpus {
  pub fn new(path: impl Into<PathBuf>, record_tag: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      record_tag: record_tag.into(),
    }
  }

  pub fn for_search_type(path: impl Into<PathBuf>, search_type: &str) -> Self {
    Self::new(path, record_tag(search_type))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Reopen the dump and stream its documents from the start.
  pub fn documents(&self) -> Result<impl Iterator<Item = Result<Vec<String>>>> {
    let records = GzCatalogReader::open(&self.path, &self.record_tag)?;
    Ok(records.filter_map(|record| match record {
      Ok(record) if record.styles.len() >= 2 => {
        Some(Ok(record.styles.iter().map(|s| to_token(s)).collect()))
      }
      Ok(_) => None,
      Err(err) => Some(Err(err)),
    }))
  }
}

impl SentenceSource for StyleCorpus {
  fn sentences(&self) -> Result<Box<dyn Iterator<Item = Result<Vec<String>>> + '_>> {
    Ok(Box::new(self.documents()?))
  }
}
