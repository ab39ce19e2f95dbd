pub mod letterbox;
pub mod tensor;

pub use letterbox::{letterbox, Letterbox};
pub use tensor::{to_nchw_tensor, to_nhwc_tensor, TensorLayout};
