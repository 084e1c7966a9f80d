//! In-memory stand-ins for flash, HTTP, time and the panel

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, ErrorKind, Read, Write};
use std::rc::Rc;

use display_interface::DisplayError;
use embedded_hal::delay::DelayNs;

use crate::display::TriColorDisplay;
use crate::error::NetworkError;
use crate::fetch::{Clock, FetchRequest, HttpMethod, HttpResponse, HttpTransport};
use crate::storage::{AssetInfo, Storage};

type Files = Rc<RefCell<HashMap<String, Vec<u8>>>>;

/// Flat file map with an optional partition size
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    files: Files,
    capacity: Option<u64>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            files: Files::default(),
            capacity: Some(capacity),
        }
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        self.files.borrow_mut().insert(path.to_string(), data.to_vec());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    fn used(files: &HashMap<String, Vec<u8>>) -> u64 {
        files.values().map(|f| f.len() as u64).sum()
    }
}

pub struct MemWriter {
    files: Files,
    capacity: Option<u64>,
    path: String,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = self.files.borrow_mut();
        if let Some(capacity) = self.capacity {
            if MemStorage::used(&files) + buf.len() as u64 > capacity {
                return Err(io::Error::other("partition full"));
            }
        }
        files
            .get_mut(&self.path)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "file removed while open"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Storage for MemStorage {
    type Reader = Cursor<Vec<u8>>;
    type Writer = MemWriter;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        self.get(path)
            .map(Cursor::new)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, path.to_string()))
    }

    fn create(&self, path: &str) -> io::Result<Self::Writer> {
        self.files.borrow_mut().insert(path.to_string(), Vec::new());
        Ok(MemWriter {
            files: self.files.clone(),
            capacity: self.capacity,
            path: path.to_string(),
        })
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        self.get(path)
            .map(|f| f.len() as u64)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, path.to_string()))
    }

    fn list(&self) -> io::Result<Vec<AssetInfo>> {
        let mut assets: Vec<AssetInfo> = self
            .files
            .borrow()
            .iter()
            .map(|(name, data)| AssetInfo {
                name: name.clone(),
                size: data.len() as u64,
            })
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    fn free_space(&self) -> io::Result<u64> {
        match self.capacity {
            Some(capacity) => Ok(capacity.saturating_sub(Self::used(&self.files.borrow()))),
            None => Ok(u64::MAX),
        }
    }
}

/// One step of a scripted response body
#[derive(Debug, Clone)]
pub enum BodyEvent {
    Data(Vec<u8>),
    /// Nothing available for this many reads
    PendingFor(u32),
    /// Nothing available, forever when used as the tail
    Pending,
    /// Each read blocks this long on the transport's clock, then returns nothing
    Blocking(u32),
    /// Connection reset
    Error,
    Close,
}

#[derive(Debug, Clone)]
pub enum Scripted {
    ConnectFailure,
    Status(u16),
    Response {
        status: u16,
        content_length: Option<u64>,
        body: Vec<BodyEvent>,
        /// Behaviour once `body` is used up
        then: BodyEvent,
    },
}

impl Scripted {
    pub fn ok(data: &[u8]) -> Self {
        Scripted::Response {
            status: 200,
            content_length: Some(data.len() as u64),
            body: vec![BodyEvent::Data(data.to_vec())],
            then: BodyEvent::Close,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub method: HttpMethod,
    pub url: String,
    pub payload: Option<Vec<u8>>,
}

/// Plays back one [`Scripted`] outcome per request, connect failures once exhausted
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Scripted>,
    repeat: Option<Scripted>,
    sent: Vec<SentRequest>,
    clock: FakeClock,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn repeating(outcome: Scripted) -> Self {
        Self {
            repeat: Some(outcome),
            ..Self::default()
        }
    }

    /// Share time with the controller so blocking reads move its clock
    pub fn with_clock(self, clock: FakeClock) -> Self {
        Self { clock, ..self }
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.sent.clone()
    }
}

pub struct ScriptedResponse {
    status: u16,
    content_length: Option<u64>,
    body: VecDeque<BodyEvent>,
    then: BodyEvent,
    clock: FakeClock,
}

impl Read for ScriptedResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let event = match self.body.pop_front() {
            Some(event) => event,
            None => self.then.clone(),
        };
        match event {
            BodyEvent::Data(mut data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.body.push_front(BodyEvent::Data(data.split_off(n)));
                }
                Ok(n)
            }
            BodyEvent::PendingFor(reads) => {
                if reads > 1 {
                    self.body.push_front(BodyEvent::PendingFor(reads - 1));
                }
                Err(ErrorKind::WouldBlock.into())
            }
            BodyEvent::Pending => Err(ErrorKind::WouldBlock.into()),
            BodyEvent::Blocking(ms) => {
                self.clock.advance(ms);
                Err(ErrorKind::WouldBlock.into())
            }
            BodyEvent::Error => Err(ErrorKind::ConnectionReset.into()),
            BodyEvent::Close => Ok(0),
        }
    }
}

impl HttpResponse for ScriptedResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl HttpTransport for ScriptedTransport {
    type Response<'a> = ScriptedResponse;

    fn send<'a>(
        &'a mut self,
        request: &FetchRequest<'_>,
    ) -> Result<Self::Response<'a>, NetworkError> {
        self.sent.push(SentRequest {
            method: request.method,
            url: request.url.to_string(),
            payload: request.payload.map(<[u8]>::to_vec),
        });

        let outcome = match self.script.pop_front() {
            Some(outcome) => outcome,
            None => self.repeat.clone().unwrap_or(Scripted::ConnectFailure),
        };
        match outcome {
            Scripted::ConnectFailure => Err(NetworkError::Connect("connection refused".into())),
            Scripted::Status(status) => Ok(ScriptedResponse {
                status,
                content_length: Some(0),
                body: VecDeque::new(),
                then: BodyEvent::Close,
                clock: self.clock.clone(),
            }),
            Scripted::Response {
                status,
                content_length,
                body,
                then,
            } => Ok(ScriptedResponse {
                status,
                content_length,
                body: body.into(),
                then,
                clock: self.clock.clone(),
            }),
        }
    }
}

/// Time only moves when something delays. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<u64>>,
    delays: Rc<RefCell<Vec<u32>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time without recording a delay
    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get() + ms as u64);
    }

    /// Waits longer than a single poll tick
    pub fn delays(&self) -> Vec<u32> {
        self.delays.borrow().iter().copied().filter(|&ms| ms > 1).collect()
    }
}

impl DelayNs for FakeClock {
    fn delay_ns(&mut self, ns: u32) {
        self.now.set(self.now.get() + (ns / 1_000_000) as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.borrow_mut().push(ms);
        self.now.set(self.now.get() + ms as u64);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub mono: Vec<u8>,
    pub accent: Vec<u8>,
}

/// Panel that remembers every window written to it
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub writes: Vec<WriteCall>,
    pub refreshes: Vec<bool>,
    /// Number of writes seen when each clear happened
    pub clears: Vec<usize>,
    /// Fail every write once this many succeeded
    pub fail_after: Option<usize>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self, y: u16) -> Option<&WriteCall> {
        self.writes.iter().find(|w| w.y == y)
    }
}

impl TriColorDisplay for RecordingDisplay {
    fn write_image(
        &mut self,
        mono: &[u8],
        accent: &[u8],
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> Result<(), DisplayError> {
        if self.fail_after.is_some_and(|n| self.writes.len() >= n) {
            return Err(DisplayError::BusWriteError);
        }
        self.writes.push(WriteCall {
            x,
            y,
            width,
            height,
            mono: mono.to_vec(),
            accent: accent.to_vec(),
        });
        Ok(())
    }

    fn refresh(&mut self, full: bool) -> Result<(), DisplayError> {
        self.refreshes.push(full);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.clears.push(self.writes.len());
        Ok(())
    }
}
