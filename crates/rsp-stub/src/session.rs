//! Per-session state and configuration.

use rsp_mem::MemoryMap;
use rsp_wire::ByteTransport;
use tracing::info;

use crate::error::StubError;
use crate::target::TargetDebugOps;

/// Default payload capacity of one packet.
pub const DEFAULT_PACKET_SIZE: usize = 256;

/// Smallest accepted payload capacity; stop and `qSupported` replies must fit.
pub const MIN_PACKET_SIZE: usize = 32;

/// Stub configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StubConfig {
    /// Payload bytes per packet, in both directions.
    pub packet_size: usize,
    /// Regions the host may access. Empty means everything, byte-wise.
    pub memory_map: MemoryMap,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            packet_size: DEFAULT_PACKET_SIZE,
            memory_map: MemoryMap::unrestricted(),
        }
    }
}

impl StubConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the packet payload capacity, raised to [`MIN_PACKET_SIZE`] if smaller.
    #[must_use]
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size.max(MIN_PACKET_SIZE);
        self
    }

    #[must_use]
    pub fn with_memory_map(mut self, memory_map: impl Into<MemoryMap>) -> Self {
        self.memory_map = memory_map.into();
        self
    }
}

/// How the host asked to resume the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    Continue { addr: Option<u64> },
    Step { addr: Option<u64> },
}

/// Why [`GdbStubSession::run`] returned control to its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Resume the target, then re-enter on its next stop.
    Resume(Resume),
    /// The host detached; the target should run freely.
    Detach,
    /// The host asked to terminate the target.
    Kill,
}

/// One debug session: packet buffers and the first-entry flag.
///
/// Owned by the caller and reused across entries. Dropping or resetting it
/// ends the session.
pub struct GdbStubSession {
    pub(crate) config: StubConfig,
    pub(crate) packet: Box<[u8]>,
    pub(crate) reply: Box<[u8]>,
    pub(crate) scratch: Box<[u8]>,
    pub(crate) first_entry: bool,
}

impl GdbStubSession {
    /// Create a session without touching the transport or target.
    #[must_use]
    pub fn new(config: StubConfig) -> Self {
        let size = config.packet_size.max(MIN_PACKET_SIZE);
        Self {
            config: StubConfig {
                packet_size: size,
                ..config
            },
            packet: vec![0; size].into_boxed_slice(),
            reply: vec![0; size].into_boxed_slice(),
            scratch: vec![0; size / 2].into_boxed_slice(),
            first_entry: true,
        }
    }

    /// Initialize the transport, then the target, and create the session.
    ///
    /// # Errors
    ///
    /// Either initialization fails.
    pub fn start<T, D>(
        config: StubConfig,
        transport: &mut T,
        target: &mut D,
    ) -> Result<Self, StubError>
    where
        T: ByteTransport + ?Sized,
        D: TargetDebugOps + ?Sized,
    {
        transport.init()?;
        target.init()?;
        info!(
            packet_size = config.packet_size,
            regions = config.memory_map.regions().len(),
            "debug stub ready"
        );
        Ok(Self::new(config))
    }

    #[must_use]
    pub const fn config(&self) -> &StubConfig {
        &self.config
    }

    /// True until the first call to `run`, and again after a detach or reset.
    #[must_use]
    pub const fn is_first_entry(&self) -> bool {
        self.first_entry
    }

    /// Forget the host; the next entry will not announce a stop.
    pub const fn reset(&mut self) {
        self.first_entry = true;
    }
}
