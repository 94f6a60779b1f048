pub mod io;
pub mod lookup;
pub mod paths;
