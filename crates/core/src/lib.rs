pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod frame_tensor;
    pub mod latest_slot;
    pub mod model_resolver;
    pub mod platform;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod observation;
    }
    pub mod infrastructure;
}

pub mod camera {
    pub mod domain {
        pub mod camera_access;
        pub mod camera_config;
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod bootstrap;
    pub mod frame_loop;
    pub mod loop_logger;
    pub mod model_slot;
    pub mod ticker;
}

pub mod overlay {
    pub mod projector;
    pub mod svg;
}
