//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx4d};

pub use crate::data::slice::{
    CompactMask, ImgWriteRaw, ImgWriteVis, IntensitySlice, MaskSlice, MaskSliceMut,
    OwnedIntensity, OwnedMask,
};
pub use crate::data::window::IntensityWindow;
pub use crate::data::{Calibration, OpenVolumeError, Volume};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::ElemType;

pub use crate::dataset::{self, home_dataset_dir_with, volume_loader, VolumeLoader};

pub use crate::distance::DistanceField;
pub use crate::measure::{
    self, ChannelConfig, ChannelSpec, ConfigError, Marker, MeasurementRow, Protocol, Report,
    ResultsTable,
};
pub use crate::overlay::Overlay;
pub use crate::region::{regions, Region};
pub use crate::segment::{segment, SegmentSpec, ThresholdMethod};
