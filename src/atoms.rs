use std::collections::HashMap;

use x11rb::{
    connection::Connection,
    errors::ReplyOrIdError,
    protocol::xproto::{Atom, ConnectionExt},
};

/// The atoms the bar reads or sets.
pub struct Atoms {
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_name: Atom,
    pub net_wm_strut_partial: Atom,
    pub net_active_window: Atom,
    pub net_current_desktop: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    /// Interns every atom the bar uses.
    ///
    /// # Errors
    /// Returns an error if any atom couldn't be interned.
    pub fn new<C: Connection>(conn: &C) -> Result<Self, ReplyOrIdError> {
        let atom_strings = [
            "_NET_WM_WINDOW_TYPE",
            "_NET_WM_WINDOW_TYPE_DOCK",
            "_NET_WM_STATE",
            "_NET_WM_STATE_STICKY",
            "_NET_WM_DESKTOP",
            "_NET_WM_NAME",
            "_NET_WM_STRUT_PARTIAL",
            "_NET_ACTIVE_WINDOW",
            "_NET_CURRENT_DESKTOP",
            "UTF8_STRING",
        ];

        let atom_nums = get_atom_nums(conn, &atom_strings)?;
        let atoms = get_atom_mapping(&atom_strings, &atom_nums);
        log::trace!("interned atoms {atoms:?}");

        Ok(Self {
            net_wm_window_type: atoms["_NET_WM_WINDOW_TYPE"],
            net_wm_window_type_dock: atoms["_NET_WM_WINDOW_TYPE_DOCK"],
            net_wm_state: atoms["_NET_WM_STATE"],
            net_wm_state_sticky: atoms["_NET_WM_STATE_STICKY"],
            net_wm_desktop: atoms["_NET_WM_DESKTOP"],
            net_wm_name: atoms["_NET_WM_NAME"],
            net_wm_strut_partial: atoms["_NET_WM_STRUT_PARTIAL"],
            net_active_window: atoms["_NET_ACTIVE_WINDOW"],
            net_current_desktop: atoms["_NET_CURRENT_DESKTOP"],
            utf8_string: atoms["UTF8_STRING"],
        })
    }
}

fn get_atom_mapping<'s>(atom_strings: &[&'s str], atom_nums: &[Atom]) -> HashMap<&'s str, Atom> {
    atom_strings
        .iter()
        .copied()
        .zip(atom_nums.iter().copied())
        .collect()
}

fn get_atom_nums<C: Connection>(conn: &C, atom_strings: &[&str]) -> Result<Vec<Atom>, ReplyOrIdError> {
    // send every request before waiting for the first reply
    let cookies = atom_strings
        .iter()
        .map(|s| conn.intern_atom(false, s.as_bytes()))
        .collect::<Result<Vec<_>, _>>()?;
    cookies
        .into_iter()
        .map(|cookie| Ok(cookie.reply()?.atom))
        .collect()
}
