/// Configuration for a timeline event plot.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    /// Pixel height of a single event row.
    pub row_height_px: f32,
    /// Pixel gap between adjacent rows.
    pub row_buffer_px: f32,
    /// Maximum number of rows the packing heuristic may create.
    pub max_row_count: usize,
    /// Automatically place events into rows to avoid overlap.
    pub stack_overlapping: bool,
    /// Merge small, tightly packed visible events into aggregates.
    pub aggregate_nearby: bool,
    /// Pixel size above which an event is never aggregated.
    pub max_aggregate_px: f32,
    /// Pixel gap above which adjacent events are not aggregated together.
    pub max_aggregate_gap_px: f32,
    /// Pixel radius around the cursor considered by hit-testing.
    pub pick_buffer_px: f32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            row_height_px: 25.0,
            row_buffer_px: 2.0,
            max_row_count: usize::MAX,
            stack_overlapping: true,
            aggregate_nearby: false,
            max_aggregate_px: 30.0,
            max_aggregate_gap_px: 5.0,
            pick_buffer_px: 10.0,
        }
    }
}
