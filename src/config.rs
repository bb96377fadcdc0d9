//!
//! This module uses the `serde` crate to serialize and deserialize a config file.
//!
//! The config decides the bar's geometry and font, which blocks exist in which order, how they look, and which data feeds and popups drive them.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    block::{Button, HitRegion},
    render::{Color, Rect},
};

/// The default height of the bar.
pub const BAR_HEIGHT: u16 = 29;
/// The default font.
pub const FONT: &str = "/usr/share/fonts/TTF/DejaVuSans.ttf";
/// The default size to render text at.
pub const FONT_SIZE: u32 = 12;
/// The default extra space around the rendered text of a `bar_center` block that still counts as a hit.
pub const CLICK_MARGIN: i32 = 13;
/// The color used for anything whose configured color couldn't be parsed.
pub const FALLBACK_COLOR: Color = Color::rgb(0xcc, 0xcc, 0xcc); // #cccccc

/// Parses a color, logging and replacing it if it is malformed.
#[must_use]
pub fn color_or_default(hex: &str, default: Color) -> Color {
    hex.parse().unwrap_or_else(|e| {
        log::warn!("BAD COLOR VALUE: {e}");
        default
    })
}

/// Replaces a leading `~` with the user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> String {
    match (path.strip_prefix('~'), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}{rest}"),
        _ => path.to_owned(),
    }
}

#[derive(Clone)]
/// Everything the bar needs to start, with colors and names validated.
pub struct Config {
    /// Where the bar lives on screen. A width of 0 means the whole screen width.
    pub bar: Rect,
    /// The fonts to draw with.
    pub font: FontConfig,
    /// The blocks in left to right order.
    pub blocks: Vec<BlockDef>,
    /// The data feeds to run. Missing sections are not run.
    pub feeds: FeedsConfig,
    /// The popup windows blocks may open.
    pub popups: PopupsConfig,
}

/// A validated block definition.
#[derive(Clone, Debug)]
pub struct BlockDef {
    pub name: String,
    pub text: String,
    pub width: u16,
    pub align: char,
    pub xoff: i32,
    pub bg: Color,
    pub fg: Color,
    pub hit: HitRegion,
    /// Paints the area left of the text with this color instead of `bg`.
    pub shade: Option<Color>,
    /// The popup a left click toggles.
    pub popup: Option<PopupKind>,
    /// Shell commands bound to mouse buttons.
    pub commands: Vec<(Button, String)>,
}

impl From<ConfigDeserialized> for Config {
    fn from(config: ConfigDeserialized) -> Self {
        let blocks = config
            .blocks
            .into_iter()
            .map(|b| {
                let hit = match b.hit {
                    HitConfig::Span => HitRegion::Span,
                    HitConfig::TextTail => HitRegion::TextTail,
                    HitConfig::BarCenter => HitRegion::BarCenter { margin: b.margin },
                };
                let commands = b
                    .commands
                    .into_iter()
                    .filter_map(|(button, command)| match button.parse::<Button>() {
                        Ok(button) => Some((button, command)),
                        Err(()) => {
                            log::warn!("block {} binds unknown button {button:?}", b.name);
                            None
                        }
                    })
                    .collect();
                BlockDef {
                    text: b.text,
                    width: b.width,
                    align: b.align,
                    xoff: b.xoff,
                    bg: color_or_default(&b.bg, FALLBACK_COLOR),
                    fg: color_or_default(&b.fg, FALLBACK_COLOR),
                    hit,
                    shade: b.shade.map(|s| color_or_default(&s, FALLBACK_COLOR)),
                    popup: b.popup,
                    commands,
                    name: b.name,
                }
            })
            .collect();

        Self {
            bar: Rect::new(
                i32::from(config.bar.x),
                i32::from(config.bar.y),
                i32::from(config.bar.width),
                i32::from(config.bar.height.clamp(1, 1000)),
            ),
            font: config.font,
            blocks,
            feeds: config.feeds,
            popups: config.popups,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
/// The base config derived from the config file.
///
/// This struct is then parsed into the `Config` struct.
pub struct ConfigDeserialized {
    /// Bar geometry.
    bar: BarSection,
    /// The specified font.
    font: FontConfig,
    /// The feeds to run.
    #[serde(default)]
    feeds: FeedsConfig,
    /// Popup settings.
    #[serde(default)]
    popups: PopupsConfig,
    /// The specified blocks.
    blocks: Vec<BlockConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BarSection {
    x: i16,
    y: i16,
    /// 0 stretches the bar over the screen.
    width: u16,
    height: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    /// The path of the font.
    pub path: String,
    /// The size to render the text at.
    pub size: u32,
    /// Fonts to take glyphs from that the main font doesn't have.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Overrides the computed text baseline of the bar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HitConfig {
    #[default]
    Span,
    TextTail,
    BarCenter,
}

/// The kinds of popups a block can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupKind {
    Weather,
    Music,
}

#[derive(Debug, Serialize, Deserialize)]
struct BlockConfig {
    name: String,
    #[serde(default = "placeholder")]
    text: String,
    width: u16,
    /// `l`, `c`, `r` or `a`.
    align: char,
    #[serde(default)]
    xoff: i32,
    bg: String,
    fg: String,
    #[serde(default)]
    hit: HitConfig,
    #[serde(default = "click_margin")]
    margin: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    popup: Option<PopupKind>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    commands: BTreeMap<String, String>,
}

fn placeholder() -> String {
    String::from("?")
}

const fn click_margin() -> i32 {
    CLICK_MARGIN
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo: Option<TodoConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    pub block: String,
    /// A `chrono` format string.
    pub format: String,
    /// Seconds between updates.
    pub interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicConfig {
    pub block: String,
    /// The `host:port` MPD listens on.
    pub address: String,
    /// Seconds to wait before reconnecting after an error.
    pub retry: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoConfig {
    pub block: String,
    /// The file whose lines are counted, re-counted whenever it is written.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub block: String,
    /// Titles longer than this many characters are cut off.
    pub max_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// One block per desktop, in desktop order.
    pub blocks: Vec<String>,
    /// The background of the current desktop's block.
    pub active: String,
    /// The background of every other desktop's block.
    pub inactive: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopupsConfig {
    #[serde(default)]
    pub weather: WeatherPopupConfig,
    #[serde(default)]
    pub music: MusicPopupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherPopupConfig {
    pub width: u16,
    pub height: u16,
    pub bg: String,
    pub fg: String,
    /// The color of the rain graph.
    pub graph: String,
    /// The buienradar station whose feel temperature is shown.
    pub station: String,
    pub lat: String,
    pub lon: String,
    /// An image drawn behind everything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl Default for WeatherPopupConfig {
    fn default() -> Self {
        Self {
            width: 239,
            height: 111,
            bg: String::from("#3C4F5B"),
            fg: String::from("#CCCCCC"),
            graph: String::from("#72A7D3"),
            station: String::from("6260"),
            lat: String::from("52.0646"),
            lon: String::from("5.2065"),
            background: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicPopupConfig {
    pub width: u16,
    pub height: u16,
    pub bg: String,
    pub fg: String,
    /// The color of the unplayed part of the progress bar.
    pub remaining: String,
    /// The root MPD paths are relative to.
    pub music_directory: String,
    /// The file name of the album art next to a track.
    pub cover: String,
}

impl Default for MusicPopupConfig {
    fn default() -> Self {
        Self {
            width: 310,
            height: 148,
            bg: String::from("#3C4F5B"),
            fg: String::from("#CCCCCC"),
            remaining: String::from("#72A7D3"),
            music_directory: String::from("~/Music"),
            cover: String::from("cover_popup.png"),
        }
    }
}

impl ConfigDeserialized {
    /// Creates a new config from a file.
    #[must_use]
    pub fn new() -> Self {
        let path =
            match xdg::BaseDirectories::with_prefix("melonbar").place_config_file("config.toml") {
                Ok(p) => p,
                Err(e) => {
                    log::error!("cant create config file with error {e:?}, using default");
                    return Self::default();
                }
            };

        log::info!("loading config from {}", path.display());

        let config_str = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                log::info!("config not found {e:?}, serializing default");

                let Ok(serialized) = toml::to_string(&Self::default()) else {
                    log::error!("couldn't serialize config into file, using default");
                    return Self::default();
                };

                match std::fs::write(&path, serialized) {
                    Ok(()) => log::info!("created default config at {}", path.display()),
                    Err(_) => {
                        log::error!("couldn't write to file, using default");
                    }
                }

                return Self::default();
            }
        };

        match toml::from_str(&config_str) {
            Ok(d) => d,
            Err(e) => {
                log::error!("error parsing config {e:?}, using default");
                Self::default()
            }
        }
    }
}

fn block(name: &str, width: u16, align: char, bg: &str, fg: &str) -> BlockConfig {
    BlockConfig {
        name: name.to_owned(),
        text: placeholder(),
        width,
        align,
        xoff: 0,
        bg: bg.to_owned(),
        fg: fg.to_owned(),
        hit: HitConfig::Span,
        margin: CLICK_MARGIN,
        shade: None,
        popup: None,
        commands: BTreeMap::new(),
    }
}

impl Default for ConfigDeserialized {
    /// Creates a new default Config if there was a problem with the specified path or config file
    fn default() -> Self {
        log::info!("using default config");

        let workspaces = ["www", "irc", "src"];
        let mut blocks = vec![block("window", 220, 'c', "#37BF8D", "#FFFFFF")];
        blocks.extend(
            workspaces
                .iter()
                .zip([74, 67, 70])
                .map(|(name, width)| BlockConfig {
                    text: (*name).to_owned(),
                    ..block(name, width, 'c', "#5394C9", "#FFFFFF")
                }),
        );
        blocks.push(BlockConfig {
            hit: HitConfig::BarCenter,
            popup: Some(PopupKind::Weather),
            ..block("clock", 800, 'a', "#445967", "#CCCCCC")
        });
        blocks.push(BlockConfig {
            xoff: -10,
            hit: HitConfig::TextTail,
            shade: Some(String::from("#445967")),
            popup: Some(PopupKind::Music),
            commands: BTreeMap::from([
                (String::from("middle"), String::from("mpc toggle")),
                (String::from("scroll_up"), String::from("mpc prev")),
                (String::from("scroll_down"), String::from("mpc next")),
            ]),
            ..block("music", 660, 'r', "#3C4F5B", "#CCCCCC")
        });
        blocks.push(BlockConfig {
            commands: BTreeMap::from([(
                String::from("left"),
                String::from("xdg-open ~/.todo"),
            )]),
            ..block("todo", 29, 'c', "#5394C9", "#FFFFFF")
        });

        Self {
            bar: BarSection {
                x: 0,
                y: 0,
                width: 0,
                height: BAR_HEIGHT,
            },
            font: FontConfig {
                path: FONT.to_owned(),
                size: FONT_SIZE,
                fallbacks: Vec::new(),
                baseline: None,
            },
            feeds: FeedsConfig {
                clock: Some(ClockConfig {
                    block: String::from("clock"),
                    format: String::from("%A, %B %-d %I:%M %p"),
                    interval: 20,
                }),
                music: Some(MusicConfig {
                    block: String::from("music"),
                    address: String::from("127.0.0.1:6600"),
                    retry: 5,
                }),
                todo: Some(TodoConfig {
                    block: String::from("todo"),
                    path: String::from("~/.todo"),
                }),
                window: Some(WindowConfig {
                    block: String::from("window"),
                    max_length: 30,
                }),
                workspace: Some(WorkspaceConfig {
                    blocks: workspaces.iter().map(|s| (*s).to_owned()).collect(),
                    active: String::from("#72A7D3"),
                    inactive: String::from("#5394C9"),
                }),
            },
            popups: PopupsConfig::default(),
            blocks,
        }
    }
}
