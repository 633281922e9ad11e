pub mod decode;
pub mod post;
pub mod pre;
