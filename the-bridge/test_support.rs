//! In-memory host editor and external engine.

use std::{
  collections::{
    HashMap,
    HashSet,
  },
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      AtomicUsize,
      Ordering,
    },
  },
};

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use ropey::Rope;
use the_bridge_diff::{
  LineEnding,
  LineEvent,
  LineReplace,
  Position,
  apply_host_edits,
  apply_line_event,
  apply_line_replacements,
  join_lines,
  split_lines,
};
use tokio::sync::Notify;

use crate::{
  config::Indentation,
  event::{
    ExternalLinesEvent,
    HostChangeEvent,
    HostContentChange,
  },
  external::ExternalEngine,
  handle::{
    ExternalHandle,
    HostHandle,
  },
  host::{
    EditTransaction,
    HostEditor,
  },
};

struct HostDoc {
  text:        String,
  version:     u64,
  cursor:      Position,
  eol:         LineEnding,
  indentation: Option<Indentation>,
}

#[derive(Default)]
pub struct FakeHost {
  docs:         Mutex<HashMap<HostHandle, HostDoc>>,
  transactions: Mutex<Vec<(HostHandle, EditTransaction)>>,
  fail_next:    AtomicBool,
  failing:      Mutex<HashSet<HostHandle>>,
  gate:         Mutex<Option<Arc<Notify>>>,
  waiting:      AtomicUsize,
}

impl FakeHost {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn open(&self, doc: HostHandle, text: &str, eol: LineEnding) {
    self.docs.lock().insert(doc, HostDoc {
      text: text.to_string(),
      version: 1,
      cursor: Position::zero(),
      eol,
      indentation: None,
    });
  }

  pub fn close(&self, doc: HostHandle) {
    self.docs.lock().remove(&doc);
  }

  pub fn text_of(&self, doc: HostHandle) -> String {
    self.docs.lock()[&doc].text.clone()
  }

  pub fn version_of(&self, doc: HostHandle) -> u64 {
    self.docs.lock()[&doc].version
  }

  pub fn indentation_of(&self, doc: HostHandle) -> Option<Indentation> {
    self.docs.lock()[&doc].indentation
  }

  pub fn transactions(&self) -> Vec<(HostHandle, EditTransaction)> {
    self.transactions.lock().clone()
  }

  pub fn fail_next(&self) {
    self.fail_next.store(true, Ordering::SeqCst);
  }

  pub fn fail_document(&self, doc: HostHandle) {
    self.failing.lock().insert(doc);
  }

  /// Makes every following apply wait until the returned notify fires.
  pub fn hold_applies(&self) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *self.gate.lock() = Some(gate.clone());
    gate
  }

  /// Number of applies currently waiting on the gate.
  pub fn waiting(&self) -> usize {
    self.waiting.load(Ordering::SeqCst)
  }

  /// Simulates the user typing: replaces the whole text and returns the
  /// change event the host would emit.
  pub fn user_edit(&self, doc: HostHandle, text: &str) -> HostChangeEvent {
    let mut docs = self.docs.lock();
    let entry = docs.get_mut(&doc).expect("document is open");
    let old = std::mem::replace(&mut entry.text, text.to_string());
    entry.version += 1;
    let end = Position::zero().traverse(&old, entry.eol);
    HostChangeEvent {
      document: doc,
      version:  entry.version,
      changes:  vec![HostContentChange {
        range_start:  Position::zero(),
        range_end:    end,
        range_length: old.chars().count(),
        text:         text.to_string(),
      }],
    }
  }
}

#[async_trait]
impl HostEditor for FakeHost {
  fn text(&self, doc: HostHandle) -> Option<Rope> {
    self.docs.lock().get(&doc).map(|doc| Rope::from(doc.text.as_str()))
  }

  fn version(&self, doc: HostHandle) -> Option<u64> {
    self.docs.lock().get(&doc).map(|doc| doc.version)
  }

  fn cursor(&self, doc: HostHandle) -> Option<Position> {
    self.docs.lock().get(&doc).map(|doc| doc.cursor)
  }

  fn set_cursor(&self, doc: HostHandle, pos: Position) {
    if let Some(doc) = self.docs.lock().get_mut(&doc) {
      doc.cursor = pos;
    }
  }

  fn set_indentation(&self, doc: HostHandle, indentation: Indentation) {
    if let Some(doc) = self.docs.lock().get_mut(&doc) {
      doc.indentation = Some(indentation);
    }
  }

  async fn apply_edits(&self, doc: HostHandle, transaction: EditTransaction) -> anyhow::Result<()> {
    let gate = self.gate.lock().clone();
    if let Some(gate) = gate {
      self.waiting.fetch_add(1, Ordering::SeqCst);
      gate.notified().await;
      self.waiting.fetch_sub(1, Ordering::SeqCst);
    } else {
      tokio::task::yield_now().await;
    }

    if self.fail_next.swap(false, Ordering::SeqCst) || self.failing.lock().contains(&doc) {
      bail!("host rejected the edit");
    }
    let mut docs = self.docs.lock();
    let Some(entry) = docs.get_mut(&doc) else {
      bail!("{doc} is closed");
    };
    entry.text = apply_host_edits(&entry.text, &transaction.edits, entry.eol);
    entry.version += 1;
    drop(docs);
    self.transactions.lock().push((doc, transaction));
    Ok(())
  }
}

struct ExternalBuffer {
  lines:  Vec<String>,
  tick:   u64,
  echoes: Vec<ExternalLinesEvent>,
}

#[derive(Default)]
pub struct FakeExternal {
  buffers:   Mutex<HashMap<ExternalHandle, ExternalBuffer>>,
  batches:   Mutex<Vec<(ExternalHandle, Vec<LineReplace>)>>,
  fail_next: AtomicBool,
}

impl FakeExternal {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn open(&self, buffer: ExternalHandle, text: &str, eol: LineEnding) {
    self.buffers.lock().insert(buffer, ExternalBuffer {
      lines:  split_lines(text, eol),
      tick:   0,
      echoes: Vec::new(),
    });
  }

  pub fn text_of(&self, buffer: ExternalHandle, eol: LineEnding) -> String {
    join_lines(&self.buffers.lock()[&buffer].lines, eol)
  }

  pub fn batches(&self) -> Vec<(ExternalHandle, Vec<LineReplace>)> {
    self.batches.lock().clone()
  }

  pub fn fail_next(&self) {
    self.fail_next.store(true, Ordering::SeqCst);
  }

  /// The line events the engine emitted for calls it received.
  pub fn take_echoes(&self, buffer: ExternalHandle) -> Vec<ExternalLinesEvent> {
    std::mem::take(&mut self.buffers.lock().get_mut(&buffer).expect("buffer is open").echoes)
  }

  /// Simulates an edit made inside the engine and returns its notification.
  pub fn edit(&self, buffer: ExternalHandle, first: i64, last: i64, lines: &[&str]) -> ExternalLinesEvent {
    self.edit_with_more(buffer, first, last, lines, false)
  }

  pub fn edit_with_more(
    &self,
    buffer: ExternalHandle,
    first: i64,
    last: i64,
    lines: &[&str],
    more: bool,
  ) -> ExternalLinesEvent {
    let lines: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
    let mut buffers = self.buffers.lock();
    let entry = buffers.get_mut(&buffer).expect("buffer is open");
    apply_line_event(&mut entry.lines, &LineEvent::new(first, last, lines.clone()));
    if entry.lines.is_empty() {
      entry.lines.push(String::new());
    }
    entry.tick += 1;
    ExternalLinesEvent {
      buffer,
      tick: entry.tick,
      first_line: first,
      last_line: last,
      lines,
      more,
    }
  }
}

#[async_trait]
impl ExternalEngine for FakeExternal {
  async fn replace_lines(&self, buffer: ExternalHandle, calls: Vec<LineReplace>) -> anyhow::Result<()> {
    tokio::task::yield_now().await;
    if self.fail_next.swap(false, Ordering::SeqCst) {
      bail!("engine did not answer");
    }
    let mut buffers = self.buffers.lock();
    let Some(entry) = buffers.get_mut(&buffer) else {
      bail!("{buffer} is closed");
    };
    for call in &calls {
      apply_line_replacements(&mut entry.lines, std::slice::from_ref(call));
      entry.tick += 1;
      let event = ExternalLinesEvent {
        buffer,
        tick: entry.tick,
        first_line: call.start_line as i64,
        last_line: call.end_line as i64,
        lines: call.lines.clone(),
        more: false,
      };
      entry.echoes.push(event);
    }
    drop(buffers);
    self.batches.lock().push((buffer, calls));
    Ok(())
  }
}
