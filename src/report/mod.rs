//! Static HTML reports with embedded Vega-Lite charts.

mod barplot;
pub mod html;
mod tabulate;
mod volcano;

pub use barplot::{barplot_file_name, barplot_spec, da_barplot, BarplotReport};
pub use tabulate::tabulate;
pub use volcano::{ancom_volcano, volcano_points, VolcanoPoint, VolcanoRequest};
