//! # FastLA RS
//!
//! A Rust library for compiling trigger programs and running captures on an
//! FPGA based fast logic analyser.
//!
//! A trigger program is a sequence of steps. Each step matches the sample bus
//! against a few per-channel patterns (levels and edges), combines the matches
//! with AND or OR, and must match a given number of times before the sequence
//! moves on. The program is compiled into a flat image of 32-bit LUT words that
//! configure the trigger engine, then loaded over a USB FIFO link together with
//! the capture parameters.
//!
//! ## Features
//!
//! - **Trigger compiler**: Pattern, combiner, count and flag LUTs for any supported geometry
//! - **Capture driver**: The full load, arm, poll and read-back sequence over any [`Transport`]
//! - **Device discovery**: Uses `serialport` for finding analysers on USB
//! - **DataFrame output**: Uses `polars` for captured samples
//! - **Testbench output**: Renders a LUT image as a VHDL stimulus array
//!
//! ## Examples
//!
//! ### Compiling a Trigger Program
//!
//! ```rust
//! use fastla_rs::{
//!     compile, AnalyserGeometry, CaptureConfig, TriggerProgram, TriggerStep,
//! };
//!
//! let geometry = AnalyserGeometry::default();
//!
//! // Rising edge on channel 0, seen three times
//! let first = TriggerStep::when(&geometry)
//!     .matches(0, "R")
//!     .times(3)
//!     .build()?;
//! // then channel 1 high while channel 2 is not low
//! let second = TriggerStep::when(&geometry)
//!     .matches(0, "XH")
//!     .does_not_match(1, "LXX")
//!     .all()
//!     .build()?;
//!
//! let program = TriggerProgram::from_steps(geometry, vec![first, second], CaptureConfig::default())?;
//! let image = compile(&program);
//! assert_eq!(image.words().len(), geometry.layout().total_luts);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Capturing
//!
//! ```rust,no_run
//! use fastla_rs::{
//!     AnalyserGeometry, CaptureConfig, LaConnector, LinkConfig, SampleRate, TriggerProgram,
//! };
//!
//! let mut analyser = LaConnector::connect(None, None, LinkConfig::default())?;
//!
//! let capture = CaptureConfig::new(SampleRate::new(0, 1)?, 40_000, 10_000)?;
//! let program = TriggerProgram::new(*analyser.geometry(), capture);
//!
//! let reading = analyser.capture(&program)?;
//! let df = reading.to_dataframe(16)?;
//! println!("Captured {} samples", df.height());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Device Discovery
//!
//! ```rust,no_run
//! use fastla_rs::LaConnector;
//!
//! for device in LaConnector::get_available_devices(None)? {
//!     println!("Found device: {} at {}", device.name, device.port);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod capture_config;
pub mod capture_reading;
pub mod geometry;
pub mod la_connector;
pub mod lfsr;
pub mod logic_analyser;
pub mod lut_encoder;
pub mod protocol;
pub mod serial_link;
pub mod transport;
pub mod trigger_config;

// Re-export the main types for convenience
pub use trigger_config::{
    Operation, Polarity, TriggerConfigError, TriggerPattern, TriggerProgram, TriggerStep,
    TriggerStepBuilder, TriggerSymbol,
};

pub use geometry::{AnalyserGeometry, LutLayout};

pub use capture_config::{CaptureConfig, CaptureConfigError, SampleRate};

pub use lut_encoder::{compile, LutImage, VhdlStimulus};

pub use transport::{Transport, TransportError};

pub use serial_link::{LinkConfig, SerialLink};

pub use la_connector::{ConnectorError, LaConnector, LaDevice};

pub use logic_analyser::{
    AnalyserError, ArmedLogicAnalyser, CapturePhase, DriverState, IdleLogicAnalyser,
};

pub use capture_reading::CaptureReading;

pub use protocol::DeviceState;
