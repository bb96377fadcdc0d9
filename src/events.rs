use std::{
    collections::HashMap,
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender},
    },
};

use x11rb::{
    connection::Connection,
    protocol::{
        Event,
        xproto::{Atom, ButtonPressEvent, ExposeEvent, PropertyNotifyEvent, Window},
    },
};

use crate::{
    connection::ConnectionHandler,
    dispatch::Dispatcher,
    error::{Error, Res},
    registry::Registry,
};

/// Fans root window property changes out to the feeds watching them.
#[derive(Default)]
pub struct PropertyBus {
    subscribers: HashMap<Atom, Vec<Sender<()>>>,
}

impl PropertyBus {
    /// Returns a receiver that gets a message every time `atom` changes on the root window.
    pub fn subscribe(&mut self, atom: Atom) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.entry(atom).or_default().push(tx);
        rx
    }

    /// Notifies every subscriber of `atom`, forgetting the ones that hung up.
    pub fn notify(&mut self, atom: Atom) {
        if let Some(subscribers) = self.subscribers.get_mut(&atom) {
            subscribers.retain(|tx| tx.send(()).is_ok());
        }
    }
}

/// Reacts to everything the X server tells the bar.
pub struct EventHandler<C: Connection> {
    pub conn: Arc<ConnectionHandler<C>>,
    pub bar: Window,
    pub dispatcher: Dispatcher,
    pub registry: Arc<Registry>,
    pub properties: PropertyBus,
}

impl<C: Connection> EventHandler<C> {
    /// Handles events until the connection breaks.
    ///
    /// # Errors
    /// Returns an error once the X server is gone.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            self.conn.flush()?;
            let event = self.conn.conn.wait_for_event()?;
            let mut event_as_option = Some(event);

            while let Some(event) = event_as_option {
                if let Err(e) = self.handle_event(&event) {
                    log::error!("{e}");
                }
                event_as_option = self.conn.conn.poll_for_event()?;
            }
        }
    }

    pub fn handle_event(&mut self, event: &Event) -> Res {
        match event {
            Event::ButtonPress(e) => self.handle_button_press(*e),
            Event::PropertyNotify(e) => self.handle_property_notify(*e),
            Event::Expose(e) => self.handle_expose(*e)?,
            Event::Error(e) => log::warn!("x11 error {e:?}"),
            _ => (),
        }
        Ok(())
    }

    fn handle_button_press(&self, event: ButtonPressEvent) {
        if event.event != self.bar {
            return;
        }
        log::trace!(
            "EVENT BUTTON PRESS x {} button {}",
            event.event_x,
            event.detail
        );
        self.dispatcher
            .dispatch(i32::from(event.event_x), event.detail);
    }

    fn handle_property_notify(&mut self, event: PropertyNotifyEvent) {
        if event.window != self.conn.root() {
            return;
        }
        self.properties.notify(event.atom);
    }

    fn handle_expose(&self, event: ExposeEvent) -> Res {
        if event.window != self.bar || event.count != 0 {
            return Ok(());
        }
        log::trace!("EVENT EXPOSE bar");
        self.registry.redraw_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_reaches_subscribers_of_the_changed_atom() {
        let mut bus = PropertyBus::default();
        let title = bus.subscribe(1);
        let desktop = bus.subscribe(2);
        let dropped = bus.subscribe(1);
        drop(dropped);

        bus.notify(1);
        bus.notify(1);
        bus.notify(3);

        assert_eq!(title.try_iter().count(), 2);
        assert!(desktop.try_recv().is_err());
        assert_eq!(bus.subscribers[&1].len(), 1);
    }
}
