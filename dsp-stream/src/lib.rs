//! # dsp-stream
//!
//! A `no_std` host-side driver for compressed audio captured by a remote DSP
//! core. The host and the DSP share nothing but a slow register-level
//! control port; the DSP records into a circular buffer split across up to
//! three memory regions, and the host pulls the compressed bytes out,
//! decompresses them incrementally and hands the result to a consumer.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`ring`] | Byte ring buffer with contiguous block views |
//! | Transport | [`port`] | `ControlPort` trait, embedded-hal I2C adapter |
//! | Remote | [`remote`] | The DSP's segmented circular buffer and its registers |
//! | Codec | [`codec`] | Decompression dispatcher, packed16 and msbc codecs |
//! | Session | [`stream`] | [`CaptureStream`](stream::CaptureStream) wiring it all together |
//!
//! ## Quick start
//!
//! ```ignore
//! use dsp_stream::port::I2cControlPort;
//! use dsp_stream::remote::RemoteConfig;
//! use dsp_stream::stream::{CaptureStream, StreamConfig};
//!
//! let port = I2cControlPort::new(i2c);
//! let remote = RemoteConfig {
//!     root_symbol: Some(host_buffer_symbol),
//!     ..RemoteConfig::default()
//! };
//! let mut stream = CaptureStream::start(port, &mut delay, remote, StreamConfig::default(), || decoder)?;
//!
//! // In the DSP interrupt handler or a polling task:
//! stream.service()?;
//!
//! // Consumer side:
//! let n = stream.read_decoded(&mut pcm)?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `i2c` | yes | [`I2cControlPort`](port::I2cControlPort) over `embedded_hal::i2c::I2c` |
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade. The crate never installs a
//! logger.

#![no_std]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod ring;
pub mod port;
pub mod remote;
pub mod codec;
pub mod stream;

#[cfg(test)]
mod test_support;
