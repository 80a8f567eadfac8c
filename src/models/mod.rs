// Domain models: upstream mount metrics, history rows, series artifacts

mod health;
mod mount;
mod sample;
mod series;

pub use health::{HostHealth, LoadAverages};
pub use mount::{MountMap, MountMetric};
pub use sample::{
    FieldValue, HistoryRow, SampleRecord, SourceReading, TIMESTAMP_ISO, TIMESTAMP_MS, TOTAL,
};
pub use series::{MonthIndex, Series, SeriesPayload, SeriesPoint, YearIndex};
