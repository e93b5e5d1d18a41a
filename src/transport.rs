//! Request/acknowledge link loop.
//!
//! One frame is written per cycle, then the loop blocks until the receiver
//! answers with a ready byte:
//!   'U' (0x55) = frame consumed, send the next one
//!   'X' (0x58) = receiver buffer overrun (logged, keep waiting for 'U')
//!   anything else is ignored
//!
//! There is no ack watchdog: a silent receiver stalls the loop until an
//! interrupt arrives. The port's short read timeout only exists so the
//! interrupt flag gets polled.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{info, trace, warn};

use crate::error::{Error, Result};
use crate::source::Pull;
use crate::stack::InputStack;

pub const ACK_READY: u8 = b'U';
pub const ACK_OVERRUN: u8 = b'X';

/// Serial read timeout; bounds how long an interrupt can go unnoticed.
const ACK_POLL: Duration = Duration::from_millis(100);

/// Longest accepted frame period for a fixed rate.
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Frames between progress log lines.
const PROGRESS_EVERY: u64 = 600;

/// Where the loop gets its frames from.
pub trait FrameFeed {
    fn next_frame(&mut self) -> Result<Pull>;
}

impl FrameFeed for InputStack {
    fn next_frame(&mut self) -> Result<Pull> {
        self.pull()
    }
}

/// Open the serial port to the receiver.
pub fn open_serial(path: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(path, baud).timeout(ACK_POLL).open()?;
    info!("[LINK] Using {path} at {baud} baud");
    Ok(port)
}

/// Frame cadence: either free-running or a fixed rate.
pub struct Pacer {
    period: Option<Duration>,
    next: Option<Instant>,
}

impl Pacer {
    pub fn free_running() -> Self {
        Self {
            period: None,
            next: None,
        }
    }

    /// Fixed frame rate. Non-positive rates fall back to free-running;
    /// rates slower than one frame per day are rejected.
    pub fn fixed(fps: f64) -> Result<Self> {
        if fps.is_nan() {
            return Err(Error::Config("frame rate is not a number".into()));
        }
        if fps <= 0.0 {
            return Ok(Self::free_running());
        }
        let period = Duration::try_from_secs_f64(1.0 / fps)
            .ok()
            .filter(|p| *p <= MAX_PERIOD)
            .ok_or_else(|| Error::Config(format!("frame rate {fps} is too low")))?;
        Ok(Self {
            period: Some(period),
            next: None,
        })
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Block until the next frame slot.
    pub fn wait(&mut self) {
        let Some(period) = self.period else { return };
        let now = Instant::now();
        let deadline = self.next.unwrap_or(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        // more than a full period late: re-anchor instead of bursting
        self.next = Some(if now > deadline + period {
            now + period
        } else {
            deadline + period
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    AwaitCadence,
    Send,
    AwaitAck,
    Done,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Every input source exhausted.
    Done,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    pub outcome: LinkOutcome,
    pub frames_sent: u64,
    pub overruns: u64,
}

pub struct TransportLoop<'a, L> {
    link: L,
    pacer: Pacer,
    interrupt: &'a AtomicBool,
    quiet: bool,
    frames_sent: u64,
    overruns: u64,
}

impl<'a, L: Read + Write> TransportLoop<'a, L> {
    pub fn new(link: L, pacer: Pacer, interrupt: &'a AtomicBool) -> Self {
        Self {
            link,
            pacer,
            interrupt,
            quiet: false,
            frames_sent: 0,
            overruns: 0,
        }
    }

    /// Suppress periodic progress lines.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[cfg(test)]
    pub fn into_link(self) -> L {
        self.link
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    fn report(&self, outcome: LinkOutcome) -> LinkReport {
        LinkReport {
            outcome,
            frames_sent: self.frames_sent,
            overruns: self.overruns,
        }
    }

    /// Drive the feed until it exhausts or the interrupt flag is raised.
    pub fn run<F: FrameFeed + ?Sized>(&mut self, feed: &mut F) -> Result<LinkReport> {
        let mut state = LinkState::AwaitCadence;
        loop {
            if self.interrupted() {
                state = LinkState::Shutdown;
            }
            state = match state {
                LinkState::AwaitCadence => {
                    self.pacer.wait();
                    LinkState::Send
                }
                LinkState::Send => match feed.next_frame()? {
                    Pull::Exhausted => LinkState::Done,
                    Pull::Frame(line) => {
                        self.link.write_all(line.as_bytes())?;
                        self.link.flush()?;
                        self.frames_sent += 1;
                        if !self.quiet && self.frames_sent % PROGRESS_EVERY == 0 {
                            info!(
                                "[LINK] {} frames sent, {} overrun(s)",
                                self.frames_sent, self.overruns
                            );
                        }
                        LinkState::AwaitAck
                    }
                },
                LinkState::AwaitAck => self.await_ack()?,
                LinkState::Done => {
                    info!("[LINK] Input exhausted after {} frames", self.frames_sent);
                    return Ok(self.report(LinkOutcome::Done));
                }
                LinkState::Shutdown => {
                    info!("[LINK] Interrupted after {} frames", self.frames_sent);
                    return Ok(self.report(LinkOutcome::Interrupted));
                }
            };
        }
    }

    fn await_ack(&mut self) -> Result<LinkState> {
        let mut byte = [0u8; 1];
        loop {
            if self.interrupted() {
                return Ok(LinkState::Shutdown);
            }
            match self.link.read(&mut byte) {
                Ok(0) => return Err(Error::LinkClosed),
                Ok(_) => match byte[0] {
                    ACK_READY => return Ok(LinkState::AwaitCadence),
                    ACK_OVERRUN => {
                        self.overruns += 1;
                        warn!(
                            "[LINK] Receiver buffer overrun (frame {}, {} total)",
                            self.frames_sent, self.overruns
                        );
                    }
                    other => trace!("[LINK] Ignoring byte {other:#04x}"),
                },
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::io;

    use super::*;
    use crate::frame::{Frame, WireLine};
    use crate::source::{FilePlayback, InputSource};
    use tempfile::TempDir;

    /// In-memory receiver: replies are consumed byte by byte; an empty reply
    /// queue reads as a timeout.
    struct MockLink {
        replies: VecDeque<io::Result<u8>>,
        written: Vec<u8>,
        on_timeout: Option<&'static AtomicBool>,
    }

    impl MockLink {
        fn new(replies: &[u8]) -> Self {
            Self {
                replies: replies.iter().map(|&b| Ok(b)).collect(),
                written: Vec::new(),
                on_timeout: None,
            }
        }

        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.written.clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Read for MockLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.replies.pop_front() {
                Some(Ok(b)) => {
                    buf[0] = b;
                    Ok(1)
                }
                Some(Err(e)) => Err(e),
                None => {
                    if let Some(flag) = self.on_timeout {
                        flag.store(true, Ordering::SeqCst);
                    }
                    Err(io::Error::new(ErrorKind::TimedOut, "timeout"))
                }
            }
        }
    }

    impl Write for MockLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Lines(VecDeque<&'static str>);

    impl InputSource for Lines {
        fn pull(&mut self) -> Result<Pull> {
            Ok(self
                .0
                .pop_front()
                .map_or(Pull::Exhausted, |l| Pull::Frame(WireLine::from_raw(l.as_bytes()))))
        }

        fn label(&self) -> &str {
            "lines"
        }
    }

    fn stack_of(lines: &[&'static str]) -> InputStack {
        let mut stack = InputStack::new();
        stack.push(Box::new(Lines(lines.iter().copied().collect())));
        stack
    }

    #[test]
    fn test_three_frames_then_done() {
        let flag = AtomicBool::new(false);
        let mut stack = stack_of(&["08000080808080", "08000480808080", "08000080808080"]);
        let mut link = TransportLoop::new(MockLink::new(b"UUU"), Pacer::free_running(), &flag);

        let report = link.run(&mut stack).unwrap();
        assert_eq!(report.outcome, LinkOutcome::Done);
        assert_eq!(report.frames_sent, 3);
        assert_eq!(link.into_link().lines().len(), 3);
    }

    #[test]
    fn test_playback_file_sends_each_line_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.txt");
        let contents = "08000080808080\n08000480808080\n08000080808080\n";
        fs::write(&path, contents).unwrap();

        let flag = AtomicBool::new(false);
        let mut stack = InputStack::new();
        stack.push(Box::new(FilePlayback::open(&path)));
        // a spare ack would allow a fourth frame if one existed
        let mut link = TransportLoop::new(MockLink::new(b"UUUU"), Pacer::free_running(), &flag);

        let report = link.run(&mut stack).unwrap();
        assert_eq!(report.outcome, LinkOutcome::Done);
        assert_eq!(report.frames_sent, 3);
        let mock = link.into_link();
        assert_eq!(mock.written, contents.as_bytes());
        assert_eq!(mock.replies.len(), 1);
    }

    #[test]
    fn test_overrun_does_not_resend() {
        let flag = AtomicBool::new(false);
        let mut stack = stack_of(&["aa", "bb"]);
        let mut link = TransportLoop::new(MockLink::new(b"XUU"), Pacer::free_running(), &flag);

        let report = link.run(&mut stack).unwrap();
        assert_eq!(report.overruns, 1);
        assert_eq!(report.frames_sent, 2);
        assert_eq!(link.into_link().lines(), vec!["aa", "bb"]);
    }

    #[test]
    fn test_noise_bytes_ignored() {
        let flag = AtomicBool::new(false);
        let mut stack = stack_of(&["aa"]);
        let mut link = TransportLoop::new(MockLink::new(b"\r\n?U"), Pacer::free_running(), &flag);
        let report = link.run(&mut stack).unwrap();
        assert_eq!(report.frames_sent, 1);
        assert_eq!(report.overruns, 0);
    }

    #[test]
    fn test_wire_bytes_are_exact() {
        let flag = AtomicBool::new(false);
        let mut stack = InputStack::new();
        struct Neutral(bool);
        impl InputSource for Neutral {
            fn pull(&mut self) -> Result<Pull> {
                if std::mem::take(&mut self.0) {
                    Ok(Pull::Frame(Frame::NEUTRAL.to_wire()))
                } else {
                    Ok(Pull::Exhausted)
                }
            }
            fn label(&self) -> &str {
                "neutral"
            }
        }
        stack.push(Box::new(Neutral(true)));
        let mut link = TransportLoop::new(MockLink::new(b"U"), Pacer::free_running(), &flag);
        link.run(&mut stack).unwrap();
        assert_eq!(link.into_link().written, b"08000080808080\n");
    }

    #[test]
    fn test_interrupt_while_waiting_for_ack() {
        static FLAG: AtomicBool = AtomicBool::new(false);
        let mut stack = stack_of(&["aa", "bb"]);
        let mut mock = MockLink::new(b"");
        mock.on_timeout = Some(&FLAG);
        let mut link = TransportLoop::new(mock, Pacer::free_running(), &FLAG);

        let report = link.run(&mut stack).unwrap();
        assert_eq!(report.outcome, LinkOutcome::Interrupted);
        assert_eq!(report.frames_sent, 1);
    }

    #[test]
    fn test_interrupt_before_first_frame() {
        let flag = AtomicBool::new(true);
        let mut stack = stack_of(&["aa"]);
        let mut link = TransportLoop::new(MockLink::new(b"U"), Pacer::free_running(), &flag);
        let report = link.run(&mut stack).unwrap();
        assert_eq!(report.outcome, LinkOutcome::Interrupted);
        assert!(link.into_link().written.is_empty());
    }

    #[test]
    fn test_closed_link_is_an_error() {
        let flag = AtomicBool::new(false);
        let mut stack = stack_of(&["aa"]);
        struct Eof;
        impl Read for Eof {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Ok(0)
            }
        }
        impl Write for Eof {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut link = TransportLoop::new(Eof, Pacer::free_running(), &flag);
        assert!(matches!(link.run(&mut stack), Err(Error::LinkClosed)));
    }

    #[test]
    fn test_fixed_pacer_spaces_frames() {
        let flag = AtomicBool::new(false);
        let mut stack = stack_of(&["aa", "bb", "cc"]);
        let mut link = TransportLoop::new(MockLink::new(b"UUU"), Pacer::fixed(100.0).unwrap(), &flag);
        let start = Instant::now();
        link.run(&mut stack).unwrap();
        // first frame goes out immediately, then two 10ms gaps
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_pacer_nonpositive_rate_is_free_running() {
        assert_eq!(Pacer::fixed(0.0).unwrap().period(), None);
        assert_eq!(Pacer::fixed(-5.0).unwrap().period(), None);
        assert_eq!(
            Pacer::fixed(50.0).unwrap().period(),
            Some(Duration::from_millis(20))
        );
    }

    #[test]
    fn test_pacer_rejects_unusable_rates() {
        assert!(matches!(Pacer::fixed(1e-30), Err(Error::Config(_))));
        assert!(matches!(Pacer::fixed(1e-6), Err(Error::Config(_))));
        assert!(matches!(Pacer::fixed(f64::NAN), Err(Error::Config(_))));
        assert!(Pacer::fixed(f64::INFINITY).unwrap().period().is_some());
    }
}
