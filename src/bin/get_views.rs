//! Returns the current number of views.

use view_counter::{counter::DynamoDbStore, views::read::GetViews};

pub fn main() -> anyhow::Result<()> {
    view_counter::exec_tokio::<_, _, GetViews<DynamoDbStore>, _>()
}
