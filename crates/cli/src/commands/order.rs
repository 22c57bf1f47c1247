use orderflow_core::config::LoadOptions;
use orderflow_core::domain::actor::ActorId;
use orderflow_core::domain::approval::Decision;
use orderflow_core::domain::order::{OrderId, OrderStatus};
use orderflow_db::{NewOrder, OrderFilter};
use rust_decimal::Decimal;

use crate::commands::{with_session, CommandResult};

pub fn create(
    options: &LoadOptions,
    order_number: &str,
    description: &str,
    amount: Decimal,
    requested_by: &str,
) -> CommandResult {
    const COMMAND: &str = "order.create";

    let new_order = NewOrder {
        order_number: order_number.to_owned(),
        description: description.to_owned(),
        amount,
        requested_by: ActorId(requested_by.to_owned()),
    };

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.create_order(new_order)) {
            Ok(view) => CommandResult::success_with_data(
                COMMAND,
                format!("created order `{}`: {}", view.order.id, view.summary.message),
                &view,
            ),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}

pub fn decide(
    options: &LoadOptions,
    order_id: &str,
    actor_id: &str,
    decision: &str,
    comments: Option<String>,
) -> CommandResult {
    const COMMAND: &str = "order.decide";

    let decision = match decision.parse::<Decision>() {
        Ok(decision) => decision,
        Err(message) => return CommandResult::failure(COMMAND, "bad_request", message, 6),
    };
    let order_id = OrderId(order_id.to_owned());
    let actor_id = ActorId(actor_id.to_owned());

    with_session(COMMAND, options, |session| {
        let submitted = session.block_on(
            session.app.service.submit_decision(&order_id, &actor_id, decision, comments),
        );
        match submitted {
            Ok(view) => CommandResult::success_with_data(
                COMMAND,
                format!("{} recorded: {}", view.order.approval_status, view.summary.message),
                &view,
            ),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}

pub fn update(options: &LoadOptions, order_id: &str, description: &str) -> CommandResult {
    const COMMAND: &str = "order.update";
    let order_id = OrderId(order_id.to_owned());

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.update_order(&order_id, description)) {
            Ok(view) => CommandResult::success_with_data(
                COMMAND,
                format!("updated order `{}` to version {}", view.order.id, view.version),
                &view,
            ),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}

pub fn status(options: &LoadOptions, order_id: &str) -> CommandResult {
    const COMMAND: &str = "order.status";
    let order_id = OrderId(order_id.to_owned());

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.approval_summary(&order_id)) {
            Ok(summary) => {
                CommandResult::success_with_data(COMMAND, summary.message.clone(), &summary)
            }
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}

pub fn show(options: &LoadOptions, order_id: &str) -> CommandResult {
    const COMMAND: &str = "order.show";
    let order_id = OrderId(order_id.to_owned());

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.order_view(&order_id)) {
            Ok(view) => CommandResult::success_with_data(
                COMMAND,
                format!("order `{}` at version {}", view.order.id, view.version),
                &view,
            ),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}

pub fn list(options: &LoadOptions, status: Option<&str>, limit: Option<u32>) -> CommandResult {
    const COMMAND: &str = "order.list";

    let status = match status.map(str::parse::<OrderStatus>).transpose() {
        Ok(status) => status,
        Err(error) => return CommandResult::failure(COMMAND, "bad_request", error.to_string(), 6),
    };
    let filter = OrderFilter { status, limit };

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.list_orders(&filter)) {
            Ok(orders) => CommandResult::success_with_data(
                COMMAND,
                format!("{} order(s)", orders.len()),
                &orders,
            ),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}

pub fn delete(options: &LoadOptions, order_id: &str) -> CommandResult {
    const COMMAND: &str = "order.delete";
    let order_id = OrderId(order_id.to_owned());

    with_session(COMMAND, options, |session| {
        match session.block_on(session.app.service.delete_order(&order_id)) {
            Ok(()) => CommandResult::success(COMMAND, format!("deleted order `{order_id}`")),
            Err(error) => CommandResult::from_application_error(COMMAND, error),
        }
    })
}
