//! Adds one view and returns the new count.

use view_counter::{counter::DynamoDbStore, views::increment::IncrementViews};

pub fn main() -> anyhow::Result<()> {
    view_counter::exec_tokio::<_, _, IncrementViews<DynamoDbStore>, _>()
}
