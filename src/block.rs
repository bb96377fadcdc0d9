//!
//! This module defines a block, a fixed region of the bar with text, colors and click actions.
use core::fmt;
use std::{
    str::FromStr,
    sync::{Arc, Mutex, OnceLock, PoisonError, RwLock},
};

use crate::{
    error::{Error, Res},
    popup::Popup,
    render::{Color, Rect, Surface},
};

/// A mouse button as reported by a button press.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Button {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
}

impl Button {
    const COUNT: usize = 5;

    /// Maps the X11 button detail (1 to 5) to a button.
    #[must_use]
    pub const fn from_detail(detail: u8) -> Option<Self> {
        match detail {
            1 => Some(Self::Left),
            2 => Some(Self::Middle),
            3 => Some(Self::Right),
            4 => Some(Self::ScrollUp),
            5 => Some(Self::ScrollDown),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Button {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "middle" => Ok(Self::Middle),
            "right" => Ok(Self::Right),
            "scroll_up" => Ok(Self::ScrollUp),
            "scroll_down" => Ok(Self::ScrollDown),
            _ => Err(()),
        }
    }
}

/// Where a block's text is placed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Align {
    Left,
    Center,
    Right,
    /// Centered on the whole bar, ignoring the block's own slot.
    AbsoluteCenter,
}

impl TryFrom<char> for Align {
    type Error = Error;

    fn try_from(tag: char) -> Result<Self, Self::Error> {
        match tag {
            'l' => Ok(Self::Left),
            'c' => Ok(Self::Center),
            'r' => Ok(Self::Right),
            'a' => Ok(Self::AbsoluteCenter),
            _ => Err(Error::InvalidAlignment(tag)),
        }
    }
}

/// Which clicks count as clicks on a block.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum HitRegion {
    /// The block's whole slot.
    #[default]
    Span,
    /// Only the right part of the slot that is covered by right aligned text.
    TextTail,
    /// The text centered on the bar, widened by `margin` on both sides.
    BarCenter { margin: i32 },
}

/// Paints a block's background before its text is drawn.
pub trait Background: Send + Sync {
    /// Fills `rect`. `text_start` is the column the text area starts at.
    fn paint(&self, surface: &mut dyn Surface, rect: Rect, text_start: i32, bg: Color);
}

/// A single color background.
pub struct Solid;

impl Background for Solid {
    fn paint(&self, surface: &mut dyn Surface, rect: Rect, _text_start: i32, bg: Color) {
        surface.fill_rect(rect, bg);
    }
}

/// A two toned background: everything left of the text uses a dimmer shade.
pub struct UsedWidth {
    pub shade: Color,
}

impl Background for UsedWidth {
    fn paint(&self, surface: &mut dyn Surface, rect: Rect, text_start: i32, bg: Color) {
        let split = text_start.clamp(rect.x, rect.right());
        surface.fill_rect(Rect { width: split - rect.x, ..rect }, self.shade);
        surface.fill_rect(
            Rect {
                x: split,
                width: rect.right() - split,
                ..rect
            },
            bg,
        );
    }
}

/// Something to do when a block is clicked.
pub type Action = Arc<dyn Fn() -> Res + Send + Sync>;

/// Everything needed to register a block.
pub struct BlockSpec {
    pub name: String,
    pub text: String,
    pub width: u16,
    /// `l`, `c`, `r` or `a`; checked when the block is painted.
    pub align: char,
    pub xoff: i32,
    pub bg: Color,
    pub fg: Color,
    pub hit: HitRegion,
    pub background: Box<dyn Background>,
}

impl BlockSpec {
    /// A left aligned, solid, plain hit-tested block.
    #[must_use]
    pub fn new(name: &str, width: u16) -> Self {
        Self {
            name: name.to_owned(),
            text: String::from("?"),
            width,
            align: 'l',
            xoff: 0,
            bg: Color::default(),
            fg: Color::rgb(0xff, 0xff, 0xff),
            hit: HitRegion::Span,
            background: Box::new(Solid),
        }
    }
}

/// The part of a block its feed changes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockState {
    pub text: String,
    pub bg: Color,
    pub fg: Color,
}

/// A fixed position, fixed width region of the bar.
///
/// Geometry never changes after registration; text and colors are written by the block's feed.
pub struct Block {
    name: String,
    x: i32,
    w: i32,
    xoff: i32,
    align: char,
    hit: HitRegion,
    background: Box<dyn Background>,
    state: Mutex<BlockState>,
    actions: RwLock<[Option<Action>; Button::COUNT]>,
    popup: OnceLock<Arc<Popup>>,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("x", &self.x)
            .field("w", &self.w)
            .field("xoff", &self.xoff)
            .field("align", &self.align)
            .field("hit", &self.hit)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Block {
    pub(crate) fn new(spec: BlockSpec, x: i32) -> Self {
        Self {
            name: spec.name,
            x,
            w: i32::from(spec.width),
            xoff: spec.xoff,
            align: spec.align,
            hit: spec.hit,
            background: spec.background,
            state: Mutex::new(BlockState {
                text: spec.text,
                bg: spec.bg,
                fg: spec.fg,
            }),
            actions: RwLock::new(Default::default()),
            popup: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    #[must_use]
    pub const fn w(&self) -> i32 {
        self.w
    }

    #[must_use]
    pub const fn xoff(&self) -> i32 {
        self.xoff
    }

    #[must_use]
    pub const fn align(&self) -> char {
        self.align
    }

    #[must_use]
    pub const fn hit(&self) -> HitRegion {
        self.hit
    }

    #[must_use]
    pub fn background(&self) -> &dyn Background {
        self.background.as_ref()
    }

    /// The block's slot on a bar of the given height.
    #[must_use]
    pub const fn rect(&self, height: i32) -> Rect {
        Rect::new(self.x, 0, self.w, height)
    }

    /// A copy of the current text and colors.
    #[must_use]
    pub fn snapshot(&self) -> BlockState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.snapshot().text
    }

    /// Applies `change` to the state and reports whether anything changed.
    pub(crate) fn modify(&self, change: impl FnOnce(&mut BlockState)) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.clone();
        change(&mut state);
        *state != before
    }

    /// Binds an action to a button, replacing any previous one.
    pub fn bind(&self, button: Button, action: Action) {
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)[button.index()] = Some(action);
    }

    #[must_use]
    pub fn action(&self, button: Button) -> Option<Action> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)[button.index()]
        .clone()
    }

    /// Attaches the popup this block owns. Only the first popup is kept; a refused one is handed back.
    #[must_use]
    pub fn set_popup(&self, popup: Arc<Popup>) -> Option<Arc<Popup>> {
        self.popup.set(popup).err()
    }

    #[must_use]
    pub fn popup(&self) -> Option<&Arc<Popup>> {
        self.popup.get()
    }
}
