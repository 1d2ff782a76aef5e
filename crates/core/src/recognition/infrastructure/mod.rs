pub mod arcface_extractor;
pub mod execution_provider;
pub mod eye_landmark_aligner;
pub mod process_face_detector;
