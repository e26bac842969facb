//! Reference-counted connection scope.
//!
//! One scope guards one logical connection. Every repository operation
//! acquires the scope before touching the connection and releases it when
//! the returned [`ScopeGuard`] drops, so nested acquisitions share one
//! physical handle:
//!
//! - `Owned` connections are created and opened on the 0 → 1 depth
//!   transition and closed and discarded on the 1 → 0 transition.
//! - `Borrowed` connections belong to the caller. They are pinned: the
//!   depth still counts, but the scope never opens or closes them.
//!
//! The depth and handle live in `Cell`/`RefCell`, so a scope (and anything
//! holding one) is `!Sync`. Callers that share a repository across threads
//! must serialize access themselves.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::sync::Arc;

use crate::config::ConnectionSettings;
use crate::connection::{ConnectionState, DbConnection};
use crate::error::{RepositoryError, Result};
use crate::provider::ProviderRegistry;

enum Slot<'c> {
    Owned {
        settings: ConnectionSettings,
        providers: Arc<ProviderRegistry>,
        conn: Option<Box<dyn DbConnection>>,
    },
    Borrowed(&'c mut dyn DbConnection),
}

impl<'c> Slot<'c> {
    fn connection(&self) -> Option<&(dyn DbConnection + 'c)> {
        match self {
            Slot::Owned { conn, .. } => {
                let c: &(dyn DbConnection + 'c) = conn.as_deref()?;
                Some(c)
            }
            Slot::Borrowed(conn) => Some(&**conn),
        }
    }

    fn connection_mut(&mut self) -> Option<&mut (dyn DbConnection + 'c)> {
        match self {
            Slot::Owned { conn, .. } => {
                let c: &mut (dyn DbConnection + 'c) = conn.as_deref_mut()?;
                Some(c)
            }
            Slot::Borrowed(conn) => Some(&mut **conn),
        }
    }
}

pub struct ConnectionScope<'c> {
    slot: RefCell<Slot<'c>>,
    depth: Cell<usize>,
}

impl ConnectionScope<'static> {
    /// A scope that creates its own connection from `settings` on demand.
    pub fn owned(settings: ConnectionSettings, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            slot: RefCell::new(Slot::Owned {
                settings,
                providers,
                conn: None,
            }),
            depth: Cell::new(0),
        }
    }
}

impl<'c> ConnectionScope<'c> {
    /// A scope pinned to a caller-supplied connection.
    pub fn borrowed(conn: &'c mut dyn DbConnection) -> Self {
        Self {
            slot: RefCell::new(Slot::Borrowed(conn)),
            depth: Cell::new(0),
        }
    }

    /// Current nesting depth. Zero means no operation holds the scope.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Whether the connection belongs to the caller.
    pub fn is_pinned(&self) -> bool {
        matches!(&*self.slot.borrow(), Slot::Borrowed(_))
    }

    /// Enter the scope, opening an owned connection on the outermost entry.
    pub fn acquire(&self) -> Result<ScopeGuard<'_, 'c>> {
        if self.depth.get() == 0 {
            let mut slot = self.slot.try_borrow_mut().map_err(|_| busy())?;
            if let Slot::Owned {
                settings,
                providers,
                conn,
            } = &mut *slot
            {
                close_owned(conn);

                let factory = providers.resolve(&settings.provider_name)?;
                let mut fresh = factory.create_connection(&settings.connection_string)?;

                if fresh.state() == ConnectionState::Broken {
                    fresh.close()?;
                }
                if fresh.state() == ConnectionState::Closed {
                    fresh.open()?;
                }

                tracing::debug!(provider = %settings.provider_name, "opened connection");
                *conn = Some(fresh);
            }
        }

        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        tracing::trace!(depth, "acquired connection scope");
        Ok(ScopeGuard { scope: self })
    }

    /// Leave the scope. The outermost release closes an owned connection.
    /// Releasing at depth zero does nothing.
    fn release(&self) {
        let depth = self.depth.get();
        if depth == 0 {
            return;
        }
        self.depth.set(depth - 1);
        tracing::trace!(depth = depth - 1, "released connection scope");

        if depth == 1 {
            let mut slot = match self.slot.try_borrow_mut() {
                Ok(slot) => slot,
                Err(_) => {
                    tracing::warn!("connection still borrowed at release; leaving it open");
                    return;
                }
            };
            if let Slot::Owned { conn, .. } = &mut *slot {
                close_owned(conn);
            }
        }
    }

    /// Close an owned connection left open by a release that found it
    /// borrowed. Only meaningful at depth zero.
    fn reap(&self) {
        if self.depth.get() != 0 {
            return;
        }
        if let Ok(mut slot) = self.slot.try_borrow_mut() {
            if let Slot::Owned { conn, .. } = &mut *slot {
                close_owned(conn);
            }
        }
    }

    /// Live state of the current connection.
    pub fn current_state(&self) -> Result<ConnectionState> {
        self.reap();
        let slot = self.slot.try_borrow().map_err(|_| busy())?;
        slot.connection()
            .map(|c| c.state())
            .ok_or(RepositoryError::NoConnection)
    }

    /// The current connection, if one exists.
    pub fn connection(&self) -> Option<Ref<'_, dyn DbConnection + 'c>> {
        self.reap();
        let slot = self.slot.try_borrow().ok()?;
        Ref::filter_map(slot, |s| s.connection()).ok()
    }
}

fn close_owned(conn: &mut Option<Box<dyn DbConnection>>) {
    if let Some(mut c) = conn.take() {
        if let Err(e) = c.close() {
            tracing::warn!(error = %e, "failed to close connection");
        }
        tracing::debug!("closed connection");
    }
}

fn busy() -> RepositoryError {
    RepositoryError::StateError("connection is already in use".to_string())
}

/// Keeps a [`ConnectionScope`] entered until dropped.
pub struct ScopeGuard<'s, 'c> {
    scope: &'s ConnectionScope<'c>,
}

impl<'s, 'c> ScopeGuard<'s, 'c> {
    /// Borrow the connection for one statement.
    pub fn connection(&self) -> Result<RefMut<'s, dyn DbConnection + 'c>> {
        let slot = self.scope.slot.try_borrow_mut().map_err(|_| busy())?;
        RefMut::filter_map(slot, |s| s.connection_mut())
            .map_err(|_| RepositoryError::NoConnection)
    }

    pub fn depth(&self) -> usize {
        self.scope.depth()
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.scope.release();
    }
}
