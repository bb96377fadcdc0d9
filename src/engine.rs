//!
//! This module paints blocks onto the bar, one at a time, in the order they were requested.
use std::sync::mpsc::Receiver;

use crate::{
    block::{Align, Block},
    error::Res,
    registry::BlockHandle,
    render::{Rect, Surface},
};

/// Computes where text of width `text_width` starts inside a slot at `x` of width `w`.
///
/// `AbsoluteCenter` ignores the slot and centers on `bar_width`. `xoff` is added last.
#[must_use]
pub const fn origin_x(align: Align, x: i32, w: i32, bar_width: i32, text_width: i32, xoff: i32) -> i32 {
    let origin = match align {
        Align::Left => x,
        Align::Center => x + (w / 2 - text_width / 2),
        Align::Right => x + w - text_width,
        Align::AbsoluteCenter => bar_width / 2 - text_width / 2,
    };
    origin + xoff
}

/// The only thing that ever touches the bar's pixels.
pub struct DrawEngine<S: Surface> {
    surface: S,
}

impl<S: Surface> DrawEngine<S> {
    pub const fn new(surface: S) -> Self {
        Self { surface }
    }

    /// Paints every block that arrives until all senders are gone.
    ///
    /// A block that fails to paint is logged and skipped.
    pub fn run(mut self, redraw: &Receiver<BlockHandle>) {
        for block in redraw {
            if let Err(e) = self.draw(&block) {
                log::error!("skipping paint of block {}: {e}", block.name());
            }
        }
        log::info!("redraw channel closed, draw engine stopping");
    }

    /// Paints one block and presents the damaged area.
    ///
    /// # Errors
    /// Returns an error if the block's alignment is invalid or the surface couldn't present.
    pub fn draw(&mut self, block: &Block) -> Res {
        let state = block.snapshot();
        let bounds = self.surface.bounds();
        let text_width = self.surface.text_width(&state.text);
        let align = Align::try_from(block.align())?;
        let x = origin_x(
            align,
            block.x(),
            block.w(),
            bounds.width,
            text_width,
            block.xoff(),
        );
        log::trace!(
            "drawing block {} with text {:?} at x {x}",
            block.name(),
            state.text
        );

        let rect = block.rect(bounds.height);
        block
            .background()
            .paint(&mut self.surface, rect, x + block.xoff(), state.bg);

        let baseline = self.surface.baseline();
        self.surface.draw_text(x, baseline, state.fg, &state.text);

        let damage = rect
            .union(&Rect::new(x, 0, text_width, bounds.height))
            .intersect(&bounds);
        self.surface.present(damage)
    }

    #[cfg(test)]
    fn into_surface(self) -> S {
        self.surface
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, mpsc},
        thread,
    };

    use super::*;
    use crate::{
        block::{BlockSpec, UsedWidth},
        error::Error,
        registry::{REDRAW_DEPTH, Registry},
        render::{
            Color,
            testing::{Op, RecordingSurface},
        },
    };

    #[test]
    fn origins_follow_the_alignment() {
        assert_eq!(origin_x(Align::Left, 100, 200, 1920, 50, 3), 103);
        assert_eq!(origin_x(Align::Center, 100, 200, 1920, 50, 0), 175);
        assert_eq!(origin_x(Align::Right, 100, 200, 1920, 50, -10), 240);
        assert_eq!(origin_x(Align::AbsoluteCenter, 100, 200, 1920, 300, 0), 810);
    }

    #[test]
    fn centered_text_stays_in_its_slot() {
        for w in [1, 2, 7, 64, 201] {
            for tw in 0..=w {
                let x = origin_x(Align::Center, 40, w, 1920, tw, 0);
                assert!((40..=40 + w).contains(&x), "w {w} tw {tw} gave {x}");
                assert!(x + tw <= 40 + w + 1, "w {w} tw {tw} overflows");
            }
        }
    }

    #[test]
    fn paints_background_text_and_presents() {
        let (tx, _rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Registry::new(tx);
        registry.register(BlockSpec::new("pad", 100)).expect("unique");
        let block = registry
            .register(BlockSpec {
                text: String::from("abcde"),
                align: 'r',
                xoff: -10,
                bg: Color::rgb(2, 2, 2),
                fg: Color::rgb(9, 9, 9),
                background: Box::new(UsedWidth {
                    shade: Color::rgb(1, 1, 1),
                }),
                ..BlockSpec::new("music", 200)
            })
            .expect("unique");

        let mut engine = DrawEngine::new(RecordingSurface::new(400, 20));
        engine.draw(&block).expect("valid block");

        // 5 glyphs of 8 px: origin 100 + 200 - 40 - 10 = 250, shade edge at 240.
        assert_eq!(
            engine.into_surface().ops(),
            vec![
                Op::Fill(Rect::new(100, 0, 140, 20), Color::rgb(1, 1, 1)),
                Op::Fill(Rect::new(240, 0, 60, 20), Color::rgb(2, 2, 2)),
                Op::Text(250, Color::rgb(9, 9, 9), String::from("abcde")),
                Op::Present(Rect::new(100, 0, 200, 20)),
            ]
        );
    }

    #[test]
    fn floating_text_is_presented_where_it_lands() {
        let (tx, _rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Registry::new(tx);
        let block = registry
            .register(BlockSpec {
                text: String::from("12:00"),
                align: 'a',
                ..BlockSpec::new("clock", 30)
            })
            .expect("unique");

        let mut engine = DrawEngine::new(RecordingSurface::new(400, 20));
        engine.draw(&block).expect("valid block");
        let ops = engine.into_surface().ops();
        assert_eq!(ops[1], Op::Text(180, Color::rgb(0xff, 0xff, 0xff), String::from("12:00")));
        assert_eq!(ops[2], Op::Present(Rect::new(0, 0, 220, 20)));
    }

    #[test]
    fn invalid_alignment_skips_only_that_paint() {
        let (tx, rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Registry::new(tx);
        let broken = registry
            .register(BlockSpec {
                align: 'x',
                ..BlockSpec::new("broken", 10)
            })
            .expect("unique");
        let fine = registry.register(BlockSpec::new("fine", 10)).expect("unique");

        let surface = RecordingSurface::new(100, 10);
        let log = Arc::clone(&surface.log);
        let mut engine = DrawEngine::new(surface);
        assert!(matches!(engine.draw(&broken), Err(Error::InvalidAlignment('x'))));

        let handle = thread::spawn(move || engine.run(&rx));
        registry.redraw(&broken).expect("engine alive");
        registry.redraw(&fine).expect("engine alive");
        drop(registry);
        drop(broken);
        drop(fine);
        handle.join().expect("engine doesn't panic");

        let ops = log.lock().expect("not poisoned").ops.clone();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[2], Op::Present(Rect::new(10, 0, 10, 10)));
    }

    #[test]
    fn update_storm_paints_serially() {
        const FEEDS: usize = 8;
        const UPDATES: usize = 50;

        let (tx, rx) = mpsc::sync_channel(REDRAW_DEPTH);
        let registry = Arc::new(Registry::new(tx));
        let blocks: Vec<_> = (0..FEEDS)
            .map(|i| {
                registry
                    .register(BlockSpec::new(&format!("b{i}"), 20))
                    .expect("unique")
            })
            .collect();

        let surface = RecordingSurface::new(200, 10);
        let log = Arc::clone(&surface.log);
        let engine = thread::spawn(move || DrawEngine::new(surface).run(&rx));

        let feeds: Vec<_> = blocks
            .into_iter()
            .map(|block| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for n in 0..UPDATES {
                        // every value is sent twice, only the first one is a change
                        let text = format!("{}", n % 7);
                        registry.update_text(&block, &text).expect("engine alive");
                        registry.update_text(&block, &text).expect("engine alive");
                    }
                })
            })
            .collect();
        feeds
            .into_iter()
            .for_each(|f| f.join().expect("feed doesn't panic"));
        drop(registry);
        engine.join().expect("engine doesn't panic");

        let log = log.lock().expect("not poisoned");
        assert_eq!(log.overlaps, 0);
        assert_eq!(log.ops.len(), FEEDS * UPDATES * 3);
        log.ops.chunks(3).for_each(|paint| {
            assert!(matches!(
                paint,
                [Op::Fill(..), Op::Text(..), Op::Present(..)]
            ));
        });
    }
}
