use iced::widget::{canvas, container, image, stack, text};
use iced::{ContentFit, Element, Length, Subscription, Task, Theme};

use facemark_core::overlay::projector::{project, OverlayConfig, OverlayTree};
use facemark_core::pipeline::bootstrap::{BootstrapEvent, BootstrapStage};
use facemark_core::shared::frame::Frame;
use facemark_core::shared::platform::PlatformFamily;

use crate::settings::Settings;
use crate::widgets::overlay_canvas::OverlayCanvas;
use crate::workers::camera_worker::{self, CameraSession};

#[derive(Debug, Clone)]
pub enum Message {
    /// Window refresh; polls the frame loop's slots.
    Frame,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Starting(BootstrapStage),
    Downloading(u64, u64),
    Ready,
    Failed(String),
}

pub struct App {
    settings: Settings,
    overlay_config: OverlayConfig,
    session: CameraSession,
    status: Status,
    camera: Option<image::Handle>,
    overlay: OverlayTree,
    seen_preview: u64,
    seen_result: u64,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let mut overlay_config = OverlayConfig::for_platform(PlatformFamily::current());
        if let Some(flip) = settings.mirror {
            overlay_config.flip_horizontal = flip;
        }
        let session = camera_worker::start(&settings);
        (
            Self {
                settings,
                overlay: OverlayTree::empty(&overlay_config),
                overlay_config,
                session,
                status: Status::Starting(BootstrapStage::RequestingPermission),
                camera: None,
                seen_preview: 0,
                seen_result: 0,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Frame => {
                self.drain_events();
                self.check_loop();
                self.refresh_camera();
                self.refresh_overlay();
            }
        }
        Task::none()
    }

    fn drain_events(&mut self) {
        for event in self.session.events.try_iter() {
            self.status = match event {
                BootstrapEvent::Stage(stage) => Status::Starting(stage),
                BootstrapEvent::DownloadProgress(done, total) => Status::Downloading(done, total),
                BootstrapEvent::Ready => Status::Ready,
                BootstrapEvent::Failed(reason) => Status::Failed(reason),
            };
        }
    }

    fn check_loop(&mut self) {
        let finished = self
            .session
            .handle
            .as_ref()
            .is_some_and(|handle| handle.is_finished());
        if !finished {
            return;
        }
        if let Some(handle) = self.session.handle.take() {
            if let Err(e) = handle.join() {
                self.status = Status::Failed(e.to_string());
            }
        }
    }

    fn refresh_camera(&mut self) {
        if let Some((version, frame)) = self.session.outputs.previews.latest_since(self.seen_preview) {
            self.seen_preview = version;
            self.camera = Some(camera_handle(&frame, self.overlay_config.flip_horizontal));
        }
    }

    /// Re-project only when the loop published a new result.
    fn refresh_overlay(&mut self) {
        if let Some((version, result)) = self.session.outputs.results.latest_since(self.seen_result) {
            self.seen_result = version;
            self.overlay = project(Some(result.as_ref()), &self.overlay_config);
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let loaded = self.status == Status::Ready;
        match (&self.camera, loaded) {
            (Some(handle), true) => {
                let camera = image(handle.clone())
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .content_fit(ContentFit::Fill);
                let overlay = canvas(OverlayCanvas::new(&self.overlay))
                    .width(Length::Fill)
                    .height(Length::Fill);
                stack![camera, overlay].into()
            }
            _ => container(text(self.status_line()).size(14))
                .center(Length::Fill)
                .into(),
        }
    }

    fn status_line(&self) -> String {
        match &self.status {
            Status::Starting(stage) => format!("{stage}\u{2026}"),
            Status::Downloading(done, total) if *total > 0 => {
                format!("Downloading face detection model\u{2026} {}%", done * 100 / total)
            }
            Status::Downloading(done, _) => {
                format!("Downloading face detection model\u{2026} {done} bytes")
            }
            Status::Ready => format!("Opening camera {}\u{2026}", self.settings.device_index),
            Status::Failed(reason) => format!("Camera unavailable: {reason}"),
        }
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    pub fn subscription(&self) -> Subscription<Message> {
        iced::window::frames().map(|_| Message::Frame)
    }
}

/// Camera frame as an image handle, mirrored to match a flipped overlay.
fn camera_handle(frame: &Frame, mirror: bool) -> image::Handle {
    let mut rgba = frame.to_rgba();
    if mirror {
        mirror_rows(&mut rgba, frame.width() as usize);
    }
    image::Handle::from_rgba(frame.width(), frame.height(), rgba)
}

fn mirror_rows(rgba: &mut [u8], width: usize) {
    let stride = width * 4;
    if stride == 0 {
        return;
    }
    for row in rgba.chunks_exact_mut(stride) {
        for x in 0..width / 2 {
            let (a, b) = (x * 4, (width - 1 - x) * 4);
            for c in 0..4 {
                row.swap(a + c, b + c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_rows_reverses_each_row() {
        let mut rgba = vec![
            1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255, //
            4, 4, 4, 255, 5, 5, 5, 255, 6, 6, 6, 255,
        ];
        mirror_rows(&mut rgba, 3);
        assert_eq!(
            rgba,
            vec![
                3, 3, 3, 255, 2, 2, 2, 255, 1, 1, 1, 255, //
                6, 6, 6, 255, 5, 5, 5, 255, 4, 4, 4, 255,
            ]
        );
    }

    #[test]
    fn test_no_result_draws_nothing() {
        let config = OverlayConfig::for_platform(PlatformFamily::Other);
        assert!(project(None, &config).is_empty());
    }
}
