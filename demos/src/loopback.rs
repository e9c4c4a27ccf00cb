//! Software loopback: stereo writers → TxChannel → simulated DMA → RxChannel → readers.
//!
//! A timer thread stands in for the DMA completion interrupt. Every period it
//! drains one period of assembled frames from the transmit ring, pads any
//! shortfall with silence, and pushes the result into the receive ring.
//!
//! ```text
//!   writer L ─┐                               ┌─► reader A (L)
//!             ├─► TxChannel ─► "DMA" ─► RxChannel
//!   writer R ─┘                               └─► reader B (R)
//! ```
//!
//! Half-way through the run the readers swap channels with `setup`, which
//! exercises the reconfiguration barrier while everything is streaming.
//!
//! ```text
//! cargo run --bin loopback -- --period-us 500 --duration-ms 3000 -v
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use frame_ring::{FramePart, PartyId, RingConfig, RxChannel, TxChannel};

/// Stereo, signed 16-bit samples.
const BYTES_PER_FRAME: usize = 4;
const LEFT: FramePart = FramePart::new(2, 0);
const RIGHT: FramePart = FramePart::new(2, 2);

#[derive(Parser, Debug)]
#[command(name = "loopback")]
#[command(about = "Stream stereo frames through a software tx/rx loopback", long_about = None)]
struct Args {
    /// Ring depth in frames, for both directions
    #[arg(short, long, default_value_t = 64)]
    frames: usize,

    /// Frames moved per simulated DMA period
    #[arg(short, long, default_value_t = 16)]
    period_frames: usize,

    /// Length of one DMA period in microseconds
    #[arg(long, default_value_t = 1000)]
    period_us: u64,

    /// Total run time in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    duration_ms: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Default)]
struct Stats {
    periods: AtomicUsize,
    short_periods: AtomicUsize,
    written: AtomicUsize,
    read: AtomicUsize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if args.period_frames == 0 || args.period_frames > args.frames {
        return Err(format!(
            "period of {} frames does not fit a {}-frame ring",
            args.period_frames, args.frames
        )
        .into());
    }

    let tx = Arc::new(TxChannel::new(RingConfig::new(2, args.frames, BYTES_PER_FRAME))?);
    let rx = Arc::new(RxChannel::new(RingConfig::new(2, args.frames, BYTES_PER_FRAME))?);
    let stop = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(Stats::default());
    let period = Duration::from_micros(args.period_us);

    log::info!(
        "loopback: {} frames x {} bytes, {} frames every {:?}",
        args.frames,
        BYTES_PER_FRAME,
        args.period_frames,
        period
    );

    let dma = {
        let (tx, rx, stop, stats) = (tx.clone(), rx.clone(), stop.clone(), stats.clone());
        let period_bytes = args.period_frames * BYTES_PER_FRAME;
        thread::spawn(move || -> frame_ring::Result<()> {
            let mut half = vec![0u8; period_bytes];
            let mut next = Instant::now();
            while !stop.load(Ordering::Relaxed) {
                let n = tx.isr_get(&mut half, period_bytes)?;
                if n < period_bytes {
                    half[n..].fill(0);
                    stats.short_periods.fetch_add(1, Ordering::Relaxed);
                }
                rx.isr_put(&half)?;
                stats.periods.fetch_add(1, Ordering::Relaxed);

                next += period;
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }
            Ok(())
        })
    };

    let writers: Vec<_> = [(LEFT, 0i16), (RIGHT, i16::MIN)]
        .into_iter()
        .map(|(part, start)| -> frame_ring::Result<_> {
            let id = tx.attach(part)?;
            let (tx, stop, stats) = (tx.clone(), stop.clone(), stats.clone());
            Ok(thread::spawn(move || write_ramp(&tx, &id, start, period, &stop, &stats)))
        })
        .collect::<frame_ring::Result<_>>()?;

    let readers: Vec<_> = [LEFT, RIGHT]
        .into_iter()
        .map(|part| -> frame_ring::Result<_> {
            let id = Arc::new(rx.attach(part)?);
            let (rx, stop, stats, session) = (rx.clone(), stop.clone(), stats.clone(), id.clone());
            Ok((id, thread::spawn(move || read_all(&rx, &session, period, &stop, &stats))))
        })
        .collect::<frame_ring::Result<_>>()?;

    let duration = Duration::from_millis(args.duration_ms);
    thread::sleep(duration / 2);

    log::info!("swapping reader channels");
    rx.setup(&readers[0].0, RIGHT)?;
    rx.setup(&readers[1].0, LEFT)?;

    thread::sleep(duration / 2);
    stop.store(true, Ordering::Relaxed);

    dma.join().map_err(|_| "dma thread panicked")??;
    for w in writers {
        w.join().map_err(|_| "writer thread panicked")??;
    }
    for (id, r) in readers {
        r.join().map_err(|_| "reader thread panicked")??;
        log::info!("reader {} lost {} frames", id, rx.overruns_of(&id)?);
    }

    log::info!("{}", tx.dump());
    log::info!("{}", rx.dump());
    log::info!(
        "{} periods ({} short), {} bytes written, {} bytes read",
        stats.periods.load(Ordering::Relaxed),
        stats.short_periods.load(Ordering::Relaxed),
        stats.written.load(Ordering::Relaxed),
        stats.read.load(Ordering::Relaxed),
    );
    Ok(())
}

/// Write a rising sawtooth into one frame part until told to stop.
fn write_ramp(
    tx: &TxChannel,
    id: &PartyId,
    start: i16,
    period: Duration,
    stop: &AtomicBool,
    stats: &Stats,
) -> frame_ring::Result<()> {
    let mut sample = start;
    let mut chunk = [0u8; 32];
    while !stop.load(Ordering::Relaxed) {
        for pair in chunk.chunks_exact_mut(2) {
            pair.copy_from_slice(&sample.to_le_bytes());
            sample = sample.wrapping_add(64);
        }
        let mut pending = &chunk[..];
        while !pending.is_empty() && !stop.load(Ordering::Relaxed) {
            let len = pending.len();
            let n = tx.write(id, &mut pending, len)?;
            if n == 0 {
                thread::sleep(period / 4);
                continue;
            }
            pending = &pending[n..];
            stats.written.fetch_add(n, Ordering::Relaxed);
        }
    }
    Ok(())
}

fn read_all(
    rx: &RxChannel,
    id: &PartyId,
    period: Duration,
    stop: &AtomicBool,
    stats: &Stats,
) -> frame_ring::Result<()> {
    let mut buf = [0u8; 64];
    let max = buf.len().min(rx.ring().capacity());
    while !stop.load(Ordering::Relaxed) {
        let n = rx.read(id, &mut buf[..], max)?;
        if n == 0 {
            thread::sleep(period / 2);
            continue;
        }
        stats.read.fetch_add(n, Ordering::Relaxed);
        log::trace!("reader {} got {} bytes", id, n);
    }
    Ok(())
}
