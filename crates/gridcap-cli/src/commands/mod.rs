pub mod check;
pub mod export;
pub mod headroom;
pub mod scenario;
pub mod util;
