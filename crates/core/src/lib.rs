pub mod detection {
    pub mod domain {
        pub mod detected_face;
        pub mod face_detector;
        pub mod face_observation_adapter;
        pub mod raw_observation;
        pub mod tracking_table;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod detection_scheduler;
    pub mod face_detection_options;
    pub mod frame_gate;
    pub mod pipeline_logger;
}

pub mod preview {
    pub mod domain {
        pub mod coordinate_transformer;
    }
}

pub mod quality {
    pub mod domain {
        pub mod face_alignment_validator;
        pub mod lighting_quality_detector;
    }
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod geometry;
}
