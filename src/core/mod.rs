//! Point data containers and file I/O.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_points, LoaderError, PointCloud};
pub use transforms::subsample_points;
pub use writers::{
    write_chm_csv, write_features_csv, write_features_json, write_geojson, write_json,
    write_labels_csv, write_ply, WriteError,
};
