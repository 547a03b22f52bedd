mod app;
mod settings;
mod widgets {
    pub mod overlay_canvas;
}
mod workers {
    pub mod camera_worker;
}

use app::App;

use facemark_core::shared::platform::PlatformFamily;

fn main() -> iced::Result {
    env_logger::init();

    let (w, h) = window_size(PlatformFamily::current());
    iced::application(App::new, App::update, App::view)
        .title("Facemark")
        .theme(App::theme)
        .subscription(App::subscription)
        .window(iced::window::Settings {
            size: iced::Size::new(w, h),
            ..Default::default()
        })
        .run()
}

/// Initial window size: the camera texture's aspect ratio at a desktop scale.
fn window_size(family: PlatformFamily) -> (f32, f32) {
    let (tw, th) = family.texture_dims();
    let height = 640.0;
    (height * tw as f32 / th as f32, height)
}
