//! Detection session: owns the active algorithm and guards its lifecycle.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};

use crate::config::DetectionConfig;
use crate::detector::{DetectionAlgorithm, MotionDetector};
use crate::error::{Error, Result};
use crate::traits::CameraDevice;

/// Detection algorithms that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// Three-frame differencing, see [`MotionDetector`].
    FrameSubtraction,
}

impl AlgorithmKind {
    /// Name used to select this algorithm.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrameSubtraction => MotionDetector::NAME,
        }
    }

    fn build<C: CameraDevice + ?Sized>(
        self,
        config: &DetectionConfig,
    ) -> Box<dyn DetectionAlgorithm<C>> {
        match self {
            Self::FrameSubtraction => Box::new(MotionDetector::new(config.clone())),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            MotionDetector::NAME => Ok(Self::FrameSubtraction),
            other => Err(Error::InvalidConfig(format!(
                "unknown detection algorithm {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    Active,
    Finalized,
}

/// Lifecycle wrapper around the selected [`DetectionAlgorithm`].
///
/// A session starts unbound. Selecting an algorithm replaces the whole
/// algorithm object at once; `init`, `detect` and `finalize` on an unbound
/// session fail with [`Error::NotConfigured`].
pub struct DetectionSession<C: CameraDevice + ?Sized> {
    config: DetectionConfig,
    algorithm: Option<Box<dyn DetectionAlgorithm<C>>>,
    kind: Option<AlgorithmKind>,
    phase: Phase,
    /// Checked by the control loop before every cycle. Nothing clears it
    /// yet; it exists so detection can be switched off externally.
    pub enabled: bool,
}

impl<C: CameraDevice + ?Sized> DetectionSession<C> {
    /// Create an unbound, enabled session.
    #[must_use]
    pub const fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            algorithm: None,
            kind: None,
            phase: Phase::Ready,
            enabled: true,
        }
    }

    /// Bind the session to the algorithm called `name`.
    ///
    /// Unknown names log a warning and leave the session unbound. An
    /// initialized algorithm is finalized before being replaced.
    pub fn select_algorithm(&mut self, name: &str) -> Option<AlgorithmKind> {
        let kind = match name.parse::<AlgorithmKind>() {
            Ok(kind) => kind,
            Err(err) => {
                warn!("{err}; detection left unconfigured");
                self.release_current();
                self.algorithm = None;
                self.kind = None;
                return None;
            }
        };

        self.release_current();
        self.algorithm = Some(kind.build(&self.config));
        self.kind = Some(kind);
        self.phase = Phase::Ready;
        info!("detection algorithm set to {kind}");
        Some(kind)
    }

    /// Currently selected algorithm, if any.
    pub const fn algorithm(&self) -> Option<AlgorithmKind> {
        self.kind
    }

    /// Whether `init` succeeded and `finalize` has not run since.
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Whether the algorithm has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.phase == Phase::Finalized
    }

    /// Initialize the selected algorithm.
    pub fn init(&mut self, camera: &C) -> Result<()> {
        let algorithm = self.algorithm.as_mut().ok_or(Error::NotConfigured)?;
        if self.phase == Phase::Active {
            return Err(Error::InvalidState("detection already initialized"));
        }
        algorithm.initialize(camera)?;
        self.phase = Phase::Active;
        info!("initialized {} detection", algorithm.name());
        Ok(())
    }

    /// Run one detection cycle. Valid only between `init` and `finalize`.
    pub fn detect(&mut self, camera: &mut C) -> Result<bool> {
        let algorithm = self.algorithm.as_mut().ok_or(Error::NotConfigured)?;
        match self.phase {
            Phase::Active => algorithm.detect(camera),
            Phase::Ready => Err(Error::InvalidState("detect called before init")),
            Phase::Finalized => Err(Error::InvalidState("detect called after finalize")),
        }
    }

    /// Release the algorithm's resources. Repeated calls are no-ops.
    pub fn finalize(&mut self) -> Result<()> {
        let algorithm = self.algorithm.as_mut().ok_or(Error::NotConfigured)?;
        if self.phase == Phase::Finalized {
            return Ok(());
        }
        algorithm.finalize();
        self.phase = Phase::Finalized;
        info!("finalized {} detection", algorithm.name());
        Ok(())
    }

    fn release_current(&mut self) {
        if let Some(algorithm) = self.algorithm.as_mut() {
            if self.phase == Phase::Active {
                algorithm.finalize();
                self.phase = Phase::Finalized;
            }
        }
    }
}
