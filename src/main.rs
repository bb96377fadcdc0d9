// Xephyr -br -ac -noreset -screen 1920x1080 :1
#![warn(clippy::correctness)]
#![warn(clippy::suspicious)]
#![warn(clippy::complexity)]
#![warn(clippy::perf)]
#![warn(clippy::style)]
// #![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
// #![warn(clippy::restriction)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]

mod atoms;
mod bar;
mod block;
mod config;
mod connection;
mod dispatch;
mod engine;
mod error;
mod events;
mod feeds;
mod mpd;
mod popup;
mod popups;
mod registry;
mod render;
mod text;
use crate::{
    bar::{XFactory, XSurface},
    block::{BlockSpec, Button, UsedWidth},
    config::{Config, ConfigDeserialized, FALLBACK_COLOR, FeedsConfig, PopupKind, color_or_default, expand_home},
    connection::{ConnectionActionExt, ConnectionHandler, spawn_command},
    dispatch::Dispatcher,
    engine::DrawEngine,
    error::{Error, Res},
    events::{EventHandler, PropertyBus},
    feeds::{clock::Clock, music::Music, todo::Todo, window::WindowTitle, workspace::Workspaces},
    popup::{Popup, PopupContent},
    registry::{REDRAW_DEPTH, Registry},
    render::{Color, Measure, Rect, SurfaceFactory},
    text::TextHandler,
};
use std::{
    path::PathBuf,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};
use x11rb::rust_connection::RustConnection;

type Conn = Arc<ConnectionHandler<RustConnection>>;

const DEFAULT_MPD: &str = "127.0.0.1:6600";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .init();

    let config = Config::from(ConfigDeserialized::new());
    let (conn, screen_num) = x11rb::connect(None)?;
    let conn: Conn = Arc::new(ConnectionHandler::new(Arc::new(conn), screen_num)?);
    let text = Arc::new(TextHandler::new(&config.font)?);

    let mut bar = config.bar;
    if bar.width == 0 {
        bar.width = i32::from(conn.get_screen_geometry().0);
    }
    log::info!("bar geometry {bar:?}");
    let surface = XSurface::new(
        Arc::clone(&conn),
        Arc::clone(&text),
        bar,
        Color::default(),
        true,
        config.font.baseline,
    )?;
    let bar_window = surface.window();

    let (tx, rx) = mpsc::sync_channel(REDRAW_DEPTH);
    let registry = Arc::new(Registry::new(tx));
    let factory: Arc<dyn SurfaceFactory> =
        Arc::new(XFactory::new(Arc::clone(&conn), Arc::clone(&text)));
    register_blocks(&registry, &config, bar, &factory)?;
    if registry.width() > bar.width {
        log::warn!(
            "blocks are {} pixels wide but the bar only has {}",
            registry.width(),
            bar.width
        );
    }

    thread::Builder::new()
        .name(String::from("draw-engine"))
        .spawn(move || DrawEngine::new(surface).run(&rx))?;
    registry.redraw_all()?;

    let mut properties = PropertyBus::default();
    spawn_feeds(&config.feeds, &registry, &conn, &mut properties)?;

    let mut event_handler = EventHandler {
        conn,
        bar: bar_window,
        dispatcher: Dispatcher::new(Arc::clone(&registry), text as Arc<dyn Measure>, bar.width),
        registry,
        properties,
    };
    event_handler.run()?;
    Ok(())
}

/// Registers every configured block and binds its commands and popup.
fn register_blocks(
    registry: &Registry,
    config: &Config,
    bar: Rect,
    factory: &Arc<dyn SurfaceFactory>,
) -> Res {
    config.blocks.iter().try_for_each(|def| {
        let mut spec = BlockSpec::new(&def.name, def.width);
        spec.text.clone_from(&def.text);
        spec.align = def.align;
        spec.xoff = def.xoff;
        spec.bg = def.bg;
        spec.fg = def.fg;
        spec.hit = def.hit;
        if let Some(shade) = def.shade {
            spec.background = Box::new(UsedWidth { shade });
        }
        let block = registry.register(spec)?;

        def.commands.iter().for_each(|(button, command)| {
            let command = command.clone();
            block.bind(*button, Arc::new(move || spawn_command(&command)));
        });

        if let Some(kind) = def.popup {
            if def.commands.iter().any(|(button, _)| *button == Button::Left) {
                log::warn!("popup of block {} replaces its left click command", def.name);
            }
            let (width, height, background, content) = popup_content(kind, config);
            let rect = Popup::geometry(&block, bar, width, height)?;
            let popup = Arc::new(Popup::new(
                &def.name,
                rect,
                background,
                Arc::clone(factory),
                content,
            ));
            let toggled = Arc::clone(&popup);
            block.bind(Button::Left, Arc::new(move || toggled.toggle().map(drop)));
            if block.set_popup(popup).is_some() {
                log::warn!("block {} already owns a popup, ignoring the new one", def.name);
            }
        }
        Ok(())
    })
}

/// The size, background and content of a popup.
fn popup_content(kind: PopupKind, config: &Config) -> (u16, u16, Color, Box<dyn PopupContent>) {
    match kind {
        PopupKind::Weather => {
            let c = &config.popups.weather;
            let bg = color_or_default(&c.bg, FALLBACK_COLOR);
            let background = c.background.as_deref().and_then(|path| {
                image::open(expand_home(path))
                    .map(|i| i.to_rgba8())
                    .inspect_err(|e| log::error!("couldn't load weather background {path}: {e}"))
                    .ok()
            });
            let content = popups::weather::Weather::new(
                &c.station,
                &c.lat,
                &c.lon,
                [
                    bg,
                    color_or_default(&c.fg, FALLBACK_COLOR),
                    color_or_default(&c.graph, FALLBACK_COLOR),
                ],
                background,
            );
            (c.width, c.height, bg, Box::new(content))
        }
        PopupKind::Music => {
            let c = &config.popups.music;
            let bg = color_or_default(&c.bg, FALLBACK_COLOR);
            let content = popups::music::Music {
                address: config
                    .feeds
                    .music
                    .as_ref()
                    .map_or_else(|| DEFAULT_MPD.to_owned(), |m| m.address.clone()),
                music_directory: PathBuf::from(expand_home(&c.music_directory)),
                cover: c.cover.clone(),
                bg,
                fg: color_or_default(&c.fg, FALLBACK_COLOR),
                remaining: color_or_default(&c.remaining, FALLBACK_COLOR),
            };
            (c.width, c.height, bg, Box::new(content))
        }
    }
}

/// Starts every configured feed on its own thread.
fn spawn_feeds(
    feeds: &FeedsConfig,
    registry: &Arc<Registry>,
    conn: &Conn,
    properties: &mut PropertyBus,
) -> Res {
    if let Some(c) = &feeds.clock {
        feeds::spawn(Box::new(Clock {
            registry: Arc::clone(registry),
            block: registry.get(&c.block)?,
            format: c.format.clone(),
            interval: Duration::from_secs(c.interval),
        }))?;
    }
    if let Some(c) = &feeds.music {
        let block = registry.get(&c.block)?;
        feeds::spawn(Box::new(Music {
            registry: Arc::clone(registry),
            popup: block.popup().cloned(),
            block,
            address: c.address.clone(),
            retry: Duration::from_secs(c.retry),
        }))?;
    }
    if let Some(c) = &feeds.todo {
        feeds::spawn(Box::new(Todo {
            registry: Arc::clone(registry),
            block: registry.get(&c.block)?,
            path: PathBuf::from(expand_home(&c.path)),
        }))?;
    }
    if let Some(c) = &feeds.window {
        feeds::spawn(Box::new(WindowTitle {
            registry: Arc::clone(registry),
            block: registry.get(&c.block)?,
            conn: Arc::clone(conn),
            changes: properties.subscribe(conn.atoms.net_active_window),
            max_length: c.max_length,
        }))?;
    }
    if let Some(c) = &feeds.workspace {
        let blocks = c
            .blocks
            .iter()
            .map(|name| registry.get(name))
            .collect::<Result<Vec<_>, Error>>()?;
        feeds::spawn(Box::new(Workspaces {
            registry: Arc::clone(registry),
            blocks,
            active: color_or_default(&c.active, FALLBACK_COLOR),
            inactive: color_or_default(&c.inactive, FALLBACK_COLOR),
            conn: Arc::clone(conn),
            changes: properties.subscribe(conn.atoms.net_current_desktop),
        }))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{block::HitRegion, render::testing::RecordingFactory};

    #[test]
    fn default_blocks_are_registered_as_configured() {
        let config = Config::from(ConfigDeserialized::default());
        let (tx, _rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Registry::new(tx);
        let factory: Arc<dyn SurfaceFactory> = Arc::new(RecordingFactory::default());
        register_blocks(&registry, &config, Rect::new(0, 0, 1920, 20), &factory)
            .expect("default blocks are valid");
        assert_eq!(registry.width(), 1920);

        let www = registry.get("www").expect("registered");
        assert_eq!(www.text(), "www");
        assert_eq!(www.align(), 'c');

        let music = registry.get("music").expect("registered");
        assert_eq!((music.align(), music.xoff()), ('r', -10));
        assert_eq!(music.hit(), HitRegion::TextTail);
        assert!(music.popup().is_some());
        assert!(music.action(Button::Left).is_some());
        assert!(music.action(Button::Middle).is_some());

        let todo = registry.get("todo").expect("registered");
        assert!(todo.popup().is_none());
    }
}
