use std::fmt;
use std::time::{Duration, Instant};

use crate::capture_config::{CaptureConfig, CaptureConfigError};
use crate::capture_reading::CaptureReading;
use crate::geometry::AnalyserGeometry;
use crate::lut_encoder::{self, LutImage};
use crate::protocol::{
    self, ControlBits, DeviceState, BYTES_PER_SAMPLE, CONFIG_KEY, CONFIG_REPLY_LEN,
    C_RD_BUFFER, C_RD_CONFIG, C_RD_STATUS, C_RD_VERSION, C_WR_CAPTURE, C_WR_PRETRIG,
};
use crate::transport::{Transport, TransportError};
use crate::trigger_config::{TriggerConfigError, TriggerProgram};

/// Step of the capture sequence a transfer belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    LoadLuts,
    WriteCaptureLength,
    WritePreTrigger,
    WriteControl,
    ReadStatus,
    ReadCaptureData,
    ReadVersion,
    ReadGeometry,
}

impl CapturePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapturePhase::LoadLuts => "load LUTs",
            CapturePhase::WriteCaptureLength => "write capture length",
            CapturePhase::WritePreTrigger => "write pre-trigger",
            CapturePhase::WriteControl => "write control",
            CapturePhase::ReadStatus => "read status",
            CapturePhase::ReadCaptureData => "read capture data",
            CapturePhase::ReadVersion => "read version",
            CapturePhase::ReadGeometry => "read geometry",
        }
    }
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyserError {
    #[error("Transport failed during {phase}: {source}")]
    Transport {
        phase: CapturePhase,
        #[source]
        source: TransportError,
    },

    #[error("Analyser reported illegal state {raw:#04x}")]
    IllegalState { raw: u8 },

    #[error("Capture not done after {elapsed:?}, analyser still {last_state:?}")]
    CaptureTimeout {
        elapsed: Duration,
        last_state: DeviceState,
    },

    #[error("Unexpected configuration key {key:02X?}")]
    BadConfigKey { key: [u8; 4] },

    #[error("Transfer unit of {max_transfer_unit} bytes cannot carry a sample")]
    TransferUnitTooSmall { max_transfer_unit: usize },

    #[error("Trigger configuration error: {0}")]
    Config(#[from] TriggerConfigError),

    #[error("Capture configuration error: {0}")]
    Capture(#[from] CaptureConfigError),
}

trait DuringPhase<T> {
    fn during(self, phase: CapturePhase) -> Result<T, AnalyserError>;
}

impl<T> DuringPhase<T> for Result<T, TransportError> {
    fn during(self, phase: CapturePhase) -> Result<T, AnalyserError> {
        self.map_err(|source| AnalyserError::Transport { phase, source })
    }
}

/// Host side view of where the capture sequence is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Configuring,
    Armed,
    Running,
    Done,
    ReadingBack,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::Idle => "Idle",
            DriverState::Configuring => "Configuring",
            DriverState::Armed => "Armed",
            DriverState::Running => "Running",
            DriverState::Done => "Done",
            DriverState::ReadingBack => "ReadingBack",
        }
    }
}

/// Analyser ready to take a configuration
#[derive(Debug)]
pub struct IdleLogicAnalyser<T: Transport> {
    link: T,
    version: Option<u8>,
    geometry: AnalyserGeometry,
    state: DriverState,
}

impl<T: Transport> IdleLogicAnalyser<T> {
    /// Wrap a link to an analyser with the default geometry, without talking to it
    pub fn new(link: T) -> Self {
        Self {
            link,
            version: None,
            geometry: AnalyserGeometry::default(),
            state: DriverState::Idle,
        }
    }

    /// Wrap a link and read the bitstream version and trigger geometry
    pub fn probe(link: T) -> Result<Self, AnalyserError> {
        let mut analyser = Self::new(link);
        let version = analyser.read_version()?;
        analyser.version = Some(version);
        analyser.geometry = analyser.read_geometry()?;
        log::info!(
            "Connected to analyser version {}, {:?}",
            version,
            analyser.geometry
        );
        Ok(analyser)
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn geometry(&self) -> &AnalyserGeometry {
        &self.geometry
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn link(&self) -> &T {
        &self.link
    }

    pub fn into_inner(self) -> T {
        self.link
    }

    fn set_state(&mut self, state: DriverState) {
        if self.state != state {
            log::debug!("Driver state {} -> {}", self.state.as_str(), state.as_str());
            self.state = state;
        }
    }

    /// Send `data`, split into pieces no larger than the link allows
    fn send_chunked(&mut self, data: &[u8], phase: CapturePhase) -> Result<(), AnalyserError> {
        let mtu = self.link.max_transfer_unit().max(1);
        for chunk in data.chunks(mtu) {
            self.link.send(chunk).during(phase)?;
        }
        log::trace!("Sent {} bytes during {}", data.len(), phase);
        Ok(())
    }

    /// Send a request and receive exactly `len` bytes in reply
    fn request(
        &mut self,
        frame: &[u8],
        len: usize,
        phase: CapturePhase,
    ) -> Result<Vec<u8>, AnalyserError> {
        self.link.send(frame).during(phase)?;
        let reply = self.link.receive(len).during(phase)?;
        if reply.len() != len {
            return Err(TransportError::ShortRead {
                expected: len,
                actual: reply.len(),
            })
            .during(phase);
        }
        Ok(reply)
    }

    /// Load a compiled trigger program into the analyser
    pub fn load_luts(&mut self, image: &LutImage) -> Result<(), AnalyserError> {
        if image.geometry() != &self.geometry {
            return Err(TriggerConfigError::GeometryMismatch.into());
        }
        self.set_state(DriverState::Configuring);
        let frame = lut_encoder::lut_config_frame(image);
        self.send_chunked(&frame, CapturePhase::LoadLuts)?;
        log::debug!("Loaded {} LUTs", image.words().len());
        Ok(())
    }

    /// Compile `program` and load it
    pub fn load_program(&mut self, program: &TriggerProgram) -> Result<(), AnalyserError> {
        program.log_steps();
        let image = lut_encoder::compile(program);
        self.load_luts(&image)
    }

    pub fn write_capture_length(&mut self, samples: u32) -> Result<(), AnalyserError> {
        let frame = protocol::sample_count_frame(C_WR_CAPTURE, samples)
            .ok_or(CaptureConfigError::SampleCountTooLarge { count: samples })?;
        self.send_chunked(&frame, CapturePhase::WriteCaptureLength)
    }

    pub fn write_pre_trigger(&mut self, samples: u32) -> Result<(), AnalyserError> {
        let frame = protocol::sample_count_frame(C_WR_PRETRIG, samples)
            .ok_or(CaptureConfigError::SampleCountTooLarge { count: samples })?;
        self.send_chunked(&frame, CapturePhase::WritePreTrigger)
    }

    pub fn write_control(&mut self, bits: ControlBits) -> Result<(), AnalyserError> {
        log::trace!("Control register <- {:#010b}", bits.bits());
        self.send_chunked(&protocol::control_frame(bits), CapturePhase::WriteControl)
    }

    /// Read the acquisition state
    pub fn read_status(&mut self) -> Result<DeviceState, AnalyserError> {
        let frame = protocol::command_frame(C_RD_STATUS);
        let [raw] = self.request_byte(&frame, CapturePhase::ReadStatus)?;
        DeviceState::from_status(raw).ok_or(AnalyserError::IllegalState { raw })
    }

    /// Read the bitstream version byte
    pub fn read_version(&mut self) -> Result<u8, AnalyserError> {
        let frame = protocol::command_frame(C_RD_VERSION);
        let [version] = self.request_byte(&frame, CapturePhase::ReadVersion)?;
        Ok(version)
    }

    fn request_byte(&mut self, frame: &[u8], phase: CapturePhase) -> Result<[u8; 1], AnalyserError> {
        let reply = self.request(frame, 1, phase)?;
        Ok([reply[0]])
    }

    /// Like [`read_version`](Self::read_version), but only logs failures
    pub fn try_read_version(&mut self) -> Option<u8> {
        match self.read_version() {
            Ok(version) => Some(version),
            Err(e) => {
                log::warn!("Could not read analyser version: {}", e);
                None
            }
        }
    }

    /// Read the trigger engine dimensions the bitstream was built with
    pub fn read_geometry(&mut self) -> Result<AnalyserGeometry, AnalyserError> {
        let phase = CapturePhase::ReadGeometry;
        let frame = protocol::command_frame(C_RD_CONFIG);
        let reply = self.request(&frame, CONFIG_REPLY_LEN, phase)?;

        let &[k0, k1, k2, k3, sample_width, steps, patterns, counter_bits] = reply.as_slice() else {
            return Err(TransportError::ShortRead {
                expected: CONFIG_REPLY_LEN,
                actual: reply.len(),
            })
            .during(phase);
        };
        let key = [k0, k1, k2, k3];
        if key != CONFIG_KEY {
            return Err(AnalyserError::BadConfigKey { key });
        }

        let geometry = AnalyserGeometry::new(
            usize::from(sample_width),
            usize::from(steps),
            usize::from(patterns),
            usize::from(counter_bits),
        )?;
        Ok(geometry)
    }

    /// Write the capture registers and start the acquisition
    pub fn start_acquisition(&mut self, program: &TriggerProgram) -> Result<(), AnalyserError> {
        let capture = program.capture();
        let divider = ControlBits::divider(capture.sample_rate().control_bits());

        self.load_program(program)?;
        self.write_capture_length(capture.capture_length())?;
        self.write_pre_trigger(capture.pre_trigger())?;
        self.write_control(ControlBits::clear())?;
        self.write_control(divider)?;
        self.write_control(divider.with_start())?;

        self.set_state(DriverState::Armed);
        Ok(())
    }

    /// Follow the device state once and mirror it in the driver state
    fn poll_once(&mut self) -> Result<DeviceState, AnalyserError> {
        let device_state = self.read_status()?;
        match device_state {
            DeviceState::Pretrig | DeviceState::Armed => self.set_state(DriverState::Armed),
            DeviceState::Run => self.set_state(DriverState::Running),
            DeviceState::Done => self.set_state(DriverState::Done),
            DeviceState::Idle => {}
        }
        Ok(device_state)
    }

    /// Poll the status until the device reports `Done`
    pub fn poll_until_done(&mut self) -> Result<(), AnalyserError> {
        let mut last = None;
        loop {
            let device_state = self.poll_once()?;
            if last != Some(device_state) {
                log::debug!("Analyser state {}", device_state.as_str());
                last = Some(device_state);
            }
            if device_state == DeviceState::Done {
                return Ok(());
            }
        }
    }

    /// Read `sample_count` samples from the capture buffer
    pub fn read_capture_data(&mut self, sample_count: u32) -> Result<Vec<u16>, AnalyserError> {
        let phase = CapturePhase::ReadCaptureData;
        let max_transfer_unit = self.link.max_transfer_unit();
        if max_transfer_unit < BYTES_PER_SAMPLE {
            return Err(AnalyserError::TransferUnitTooSmall { max_transfer_unit });
        }
        self.set_state(DriverState::ReadingBack);

        // Whole samples per request, and the length must fit the 16-bit field
        let chunk = (max_transfer_unit & !1).min(0xFFFE);
        let total = sample_count as usize * BYTES_PER_SAMPLE;
        let mut samples = Vec::with_capacity(sample_count as usize);
        let mut offset = 0;

        while offset < total {
            let len = chunk.min(total - offset);
            let bytes = self.request(&protocol::read_buffer_frame(len as u16), len, phase)?;
            samples.extend(protocol::decode_samples(&bytes));
            offset += len;
        }

        log::debug!("Read {} samples from C_RD_BUFFER ({:#04x})", samples.len(), C_RD_BUFFER);
        self.set_state(DriverState::Idle);
        Ok(samples)
    }

    fn read_reading(&mut self, capture: &CaptureConfig) -> Result<CaptureReading, AnalyserError> {
        let samples = self.read_capture_data(capture.capture_length())?;
        Ok(CaptureReading::new(samples, capture))
    }

    /// Run one complete acquisition with `program` and read it back
    #[tracing::instrument(skip_all, fields(capture_length = program.capture().capture_length()))]
    pub fn capture(&mut self, program: &TriggerProgram) -> Result<CaptureReading, AnalyserError> {
        self.start_acquisition(program)?;
        self.poll_until_done()?;
        self.read_reading(program.capture())
    }

    /// Start an acquisition and hand back a handle to wait on it
    pub fn arm(
        mut self,
        program: &TriggerProgram,
    ) -> Result<ArmedLogicAnalyser<T>, (Self, AnalyserError)> {
        match self.start_acquisition(program) {
            Ok(()) => Ok(ArmedLogicAnalyser {
                analyser: self,
                capture: *program.capture(),
            }),
            Err(e) => {
                self.set_state(DriverState::Idle);
                Err((self, e))
            }
        }
    }
}

/// Analyser with an acquisition in flight
#[derive(Debug)]
pub struct ArmedLogicAnalyser<T: Transport> {
    analyser: IdleLogicAnalyser<T>,
    capture: CaptureConfig,
}

impl<T: Transport> ArmedLogicAnalyser<T> {
    pub fn state(&self) -> DriverState {
        self.analyser.state()
    }

    /// Read the device state once
    pub fn poll_status(&mut self) -> Result<DeviceState, AnalyserError> {
        self.analyser.poll_once()
    }

    fn finish(mut self) -> Result<(IdleLogicAnalyser<T>, CaptureReading), AnalyserError> {
        let reading = self.analyser.read_reading(&self.capture)?;
        Ok((self.analyser, reading))
    }

    /// Poll once; read the capture back if the device is done
    pub fn try_get_result(
        mut self,
    ) -> Result<Result<(IdleLogicAnalyser<T>, CaptureReading), Self>, AnalyserError> {
        match self.poll_status()? {
            DeviceState::Done => self.finish().map(Ok),
            _ => Ok(Err(self)),
        }
    }

    /// Block until the capture is done and read it back
    pub fn wait(mut self) -> Result<(IdleLogicAnalyser<T>, CaptureReading), AnalyserError> {
        self.analyser.poll_until_done()?;
        self.finish()
    }

    /// Like [`wait`](Self::wait), but give up after `timeout` and keep the handle
    pub fn wait_timeout(
        mut self,
        timeout: Duration,
    ) -> Result<(IdleLogicAnalyser<T>, CaptureReading), (Self, AnalyserError)> {
        let start = Instant::now();
        loop {
            match self.poll_status() {
                Ok(DeviceState::Done) => break,
                Ok(last_state) if start.elapsed() >= timeout => {
                    let e = AnalyserError::CaptureTimeout {
                        elapsed: start.elapsed(),
                        last_state,
                    };
                    return Err((self, e));
                }
                Ok(_) => {}
                Err(e) => return Err((self, e)),
            }
        }

        let capture = self.capture;
        match self.analyser.read_reading(&capture) {
            Ok(reading) => Ok((self.analyser, reading)),
            Err(e) => Err((self, e)),
        }
    }

    /// Abort the acquisition by clearing the control register
    pub fn cancel(mut self) -> Result<IdleLogicAnalyser<T>, AnalyserError> {
        self.analyser.write_control(ControlBits::clear())?;
        self.analyser.set_state(DriverState::Idle);
        log::debug!("Acquisition cancelled");
        Ok(self.analyser)
    }
}
