pub mod pipeline_logger;
pub mod swap_error;
pub mod swap_faces_use_case;
pub mod target_face_policy;
