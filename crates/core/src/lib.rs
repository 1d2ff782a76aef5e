pub mod analysis {
    pub mod analyze_photo_use_case;
    pub mod infrastructure;
}

pub mod library {
    pub mod domain {
        pub mod face_record;
        pub mod library_repository;
        pub mod library_state;
        pub mod person;
    }
    pub mod face_library;
    pub mod infrastructure;
}

pub mod media {
    pub mod domain {
        pub mod image_writer;
        pub mod photo_reader;
    }
    pub mod infrastructure;
}

pub mod recognition {
    pub mod domain {
        pub mod embedding_extractor;
        pub mod face_aligner;
        pub mod face_detector;
        pub mod face_matcher;
        pub mod person_clusterer;
        pub mod vector_math;
    }
    pub mod infrastructure;
}

pub mod shared {
    pub mod bitmap;
    pub mod bounding_box;
    pub mod constants;
    pub mod model_resolver;
    pub mod settings;
}
