pub mod diskstats;
pub mod mounts;
pub mod open_files;
