//! Per-message command dispatch.

use planner_core::{Inbound, Outbound, PlannerError, User};
use planner_store::{Database, EventRepo, UserRepo};
use tracing::{debug, error, info, warn};

use crate::command::{self, Command};
use crate::identity::IdentityResolver;
use crate::replies;

/// Stateless between messages; every call resolves the sender afresh.
pub struct CommandRouter {
    events: EventRepo,
    users: UserRepo,
    identity: IdentityResolver,
}

impl CommandRouter {
    pub fn new(db: Database, identity: IdentityResolver) -> Self {
        Self {
            events: EventRepo::new(db.clone()),
            users: UserRepo::new(db),
            identity,
        }
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// Resolve the sender, run the command and turn the outcome into a reply.
    /// Never fails; internal errors become generic text.
    pub fn handle(&self, msg: &Inbound) -> Outbound {
        let user = match self.identity.resolve(
            msg.sender_id,
            msg.username.as_deref(),
            &msg.given_name,
            msg.family_name.as_deref(),
        ) {
            Ok(user) => user,
            Err(e) => {
                error!(sender_id = %msg.sender_id, error = %e, "identity resolution failed");
                return Outbound::new(msg.chat_id, replies::AUTH_ERROR);
            }
        };

        let command = Command::classify(msg);
        let name = command.name();
        debug!(sender_id = %user.platform_id, command = name, "dispatching");

        let text = match self.dispatch(command, &user) {
            Ok(text) => text,
            Err(e) => {
                if e.is_user_error() {
                    warn!(sender_id = %user.platform_id, command = name, kind = e.error_kind(), error = %e, "command rejected");
                } else {
                    error!(sender_id = %user.platform_id, command = name, kind = e.error_kind(), error = %e, "command failed");
                }
                replies::failure(name, &e)
            }
        };
        Outbound::new(msg.chat_id, text)
    }

    /// Run one classified command for an already resolved user.
    pub fn dispatch(&self, command: Command, user: &User) -> Result<String, PlannerError> {
        if command.requires_admin() && !self.identity.is_admin(user.platform_id) {
            return Err(PlannerError::Permission(format!(
                "{} requires admin, user {} is not",
                command.name(),
                user.platform_id
            )));
        }

        match command {
            Command::Start => Ok(replies::welcome(&user.given_name)),
            Command::Help => Ok(replies::help()),
            Command::Events => self.list_events(),
            Command::MyEvents => self.list_own_events(user),
            Command::Create(args) => self.create_event(args.as_deref(), user),
            Command::Update(args) => self.update_event(args.as_deref(), user),
            Command::Admin => Ok(replies::admin_menu()),
            Command::AdminUsers => Ok(replies::user_list(&self.users.list()?)),
            Command::AdminStats => self.stats(),
            Command::AdminMakeAdmin(args) => self.make_admin(args.as_deref(), user),
            Command::AdminDeleteEvent(args) => self.delete_event(args.as_deref(), user),
            Command::Text(text) => Ok(replies::echo(&text)),
        }
    }

    fn list_events(&self) -> Result<String, PlannerError> {
        let events = self.events.get_all()?;
        if events.is_empty() {
            return Ok(replies::NO_EVENTS.to_string());
        }
        Ok(replies::event_list("All events", &events))
    }

    fn list_own_events(&self, user: &User) -> Result<String, PlannerError> {
        let events: Vec<_> = self
            .events
            .get_all()?
            .into_iter()
            .filter(|e| e.created_by == user.platform_id)
            .collect();
        if events.is_empty() {
            return Ok(replies::NO_OWN_EVENTS.to_string());
        }
        Ok(replies::event_list("Your events", &events))
    }

    fn create_event(&self, args: Option<&str>, user: &User) -> Result<String, PlannerError> {
        let draft = command::parse_event_payload(args)?;
        let event = self.events.create(&draft.created_by(user.platform_id))?;
        info!(event_id = %event.id, created_by = %user.platform_id, "event created");
        Ok(replies::event_created(&event))
    }

    fn update_event(&self, args: Option<&str>, user: &User) -> Result<String, PlannerError> {
        let (id, draft) = command::parse_update_payload(args)?;
        let mut event = self.events.get_by_id(id)?;
        if event.created_by != user.platform_id && !self.identity.is_admin(user.platform_id) {
            return Err(PlannerError::Permission(format!(
                "user {} may not edit event {id}",
                user.platform_id
            )));
        }
        event.apply(draft);
        let event = self.events.update(&event)?;
        info!(event_id = %event.id, updated_by = %user.platform_id, "event updated");
        Ok(replies::event_updated(&event))
    }

    fn stats(&self) -> Result<String, PlannerError> {
        let users = self.users.count()?;
        let admins = self.users.count_admins()?;
        let events = self.events.count()?;
        Ok(replies::stats(users, admins, events))
    }

    fn make_admin(&self, args: Option<&str>, user: &User) -> Result<String, PlannerError> {
        let target = command::parse_platform_id(args)?;
        self.identity.promote_to_admin(target)?;
        info!(promoted = %target, promoted_by = %user.platform_id, "admin granted");
        Ok(replies::promoted(&target.to_string()))
    }

    fn delete_event(&self, args: Option<&str>, user: &User) -> Result<String, PlannerError> {
        let id = command::parse_event_id(args)?;
        let event = self.events.get_by_id(id)?;
        self.events.delete_by_id(id)?;
        info!(event_id = %id, deleted_by = %user.platform_id, "event deleted");
        Ok(replies::event_deleted(&event))
    }
}
