//! Offline replay harness for the DMX line driver.
//!
//! Feeds a capture of timestamped line events through the receive
//! state machine on the host and prints every frame it produces,
//! which makes protocol captures from a logic analyzer debuggable
//! without hardware in the loop.
//!
//! Capture format, one event per line:
//!
//! ```text
//! # comment
//! +0    break
//! +100  0x00
//! +44   0x2A
//! +2000 idle
//! ```
//!
//! `+N` advances the line clock by N microseconds before the event.
//! `break` is a BREAK condition, a hex/decimal literal is a data byte,
//! and `idle` is pure silence (useful to let the inter-slot watchdog
//! run).

mod sim;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use rdmx_line::{DmxPort, PortDirection};

use crate::sim::SimLine;

#[derive(Parser, Debug)]
struct Args {
    /// Capture file to replay.
    capture: PathBuf,

    /// Print every slot value of each DMX frame instead of a summary.
    #[clap(long)]
    dump_slots: bool,
}

#[derive(Debug, Clone, Copy)]
enum CaptureEvent {
    Break,
    Byte(u8),
    Idle,
}

fn parse_capture(text: &str) -> Result<Vec<(u32, CaptureEvent)>, String> {
    let mut events = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let delta = parts
            .next()
            .and_then(|d| d.strip_prefix('+'))
            .and_then(|d| d.parse::<u32>().ok())
            .ok_or_else(|| format!("line {}: expected '+<micros>'", lineno + 1))?;
        let event = match parts.next() {
            Some("break") => CaptureEvent::Break,
            Some("idle") => CaptureEvent::Idle,
            Some(byte) => {
                let value = if let Some(hex) = byte.strip_prefix("0x") {
                    u8::from_str_radix(hex, 16)
                } else {
                    byte.parse::<u8>()
                }
                .map_err(|_| format!("line {}: bad byte literal {:?}", lineno + 1, byte))?;
                CaptureEvent::Byte(value)
            }
            None => return Err(format!("line {}: missing event", lineno + 1)),
        };
        events.push((delta, event));
    }
    Ok(events)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let text = match fs::read_to_string(&args.capture) {
        Ok(text) => text,
        Err(err) => {
            error!("Cannot read {}: {}", args.capture.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let events = match parse_capture(&text) {
        Ok(events) => events,
        Err(err) => {
            error!("Bad capture: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let line = SimLine::new();
    let mut port = DmxPort::new(line.uart(), line.timer(), line.pin());
    port.init();
    port.set_direction(PortDirection::Input, true);

    let mut dmx_frames = 0u32;
    let mut rdm_frames = 0u32;
    for (delta, event) in events {
        sim::advance(&line, &mut port, delta);
        match event {
            CaptureEvent::Break => {
                line.push_break();
                port.service_uart();
            }
            CaptureEvent::Byte(byte) => {
                line.push_byte(byte);
                port.service_uart();
            }
            CaptureEvent::Idle => {}
        }

        while let Some(frame) = port.poll_dmx_frame() {
            dmx_frames += 1;
            info!(
                "[{:>10} us] DMX frame: {} slots, slot-to-slot {} us, break-to-break {} us",
                line.now(),
                frame.slots_in_packet,
                frame.slot_to_slot_us,
                frame.break_to_break_us
            );
            if args.dump_slots {
                info!("  {:02x?}", frame.slots());
            }
        }
        while let Some(frame) = port.poll_rdm_frame() {
            rdm_frames += 1;
            info!(
                "[{:>10} us] RDM frame: {} bytes: {:02x?}",
                line.now(),
                frame.len,
                frame.bytes()
            );
        }
    }

    // One extra quiet period so a frame cut off by the end of the
    // capture still gets finalized by the watchdog.
    sim::advance(&line, &mut port, 1_000_000);
    while let Some(frame) = port.poll_dmx_frame() {
        dmx_frames += 1;
        info!(
            "[{:>10} us] DMX frame (tail): {} slots",
            line.now(),
            frame.slots_in_packet
        );
    }

    let stats = port.total_statistics();
    info!(
        "Replay done: {} DMX / {} RDM frames delivered; started {} DMX / {} RDM, {} dropped, {} fps",
        dmx_frames,
        rdm_frames,
        stats.dmx_packets,
        stats.rdm_packets,
        stats.frames_dropped,
        port.updates_per_second()
    );
    ExitCode::SUCCESS
}
