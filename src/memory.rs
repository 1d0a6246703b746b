//! Process-local store implementations. They follow the same contracts as the
//! Postgres stores and let the HTTP layer run without a database.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{NewUser, User, UserChanges},
    },
    db::StoreError,
    expenses::{
        query::{CategoryStat, ExpenseFilter, ExpenseQuery},
        repo::ExpenseStore,
        repo_types::{Category, Expense, ExpenseChanges, NewExpense},
    },
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Table<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

const USERS_EMAIL_KEY: &str = "users_email_key";

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut table = lock(&self.users);
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(USERS_EMAIL_KEY.into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: table.allocate_id(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = lock(&self.users);
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.users).rows.get(&id).cloned())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut table = lock(&self.users);
        if let Some(email) = &changes.email {
            if table.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation(USERS_EMAIL_KEY.into()));
            }
        }
        let Some(user) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}

#[derive(Default)]
pub struct MemoryExpenseStore {
    expenses: Mutex<Table<Expense>>,
}

impl MemoryExpenseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseStore for MemoryExpenseStore {
    async fn insert(&self, user_id: i64, expense: NewExpense) -> Result<Expense, StoreError> {
        let mut table = lock(&self.expenses);
        let now = OffsetDateTime::now_utc();
        let row = Expense {
            id: table.allocate_id(),
            user_id,
            title: expense.title,
            description: expense.description,
            amount: expense.amount,
            category: expense.category,
            expense_date: expense.expense_date,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find(&self, user_id: i64, id: i64) -> Result<Option<Expense>, StoreError> {
        let table = lock(&self.expenses);
        Ok(table.rows.get(&id).filter(|e| e.user_id == user_id).cloned())
    }

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: ExpenseChanges,
    ) -> Result<Option<Expense>, StoreError> {
        let mut table = lock(&self.expenses);
        let Some(expense) = table.rows.get_mut(&id).filter(|e| e.user_id == user_id) else {
            return Ok(None);
        };
        changes.apply(expense);
        expense.updated_at = OffsetDateTime::now_utc();
        Ok(Some(expense.clone()))
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let mut table = lock(&self.expenses);
        let owned = table.rows.get(&id).is_some_and(|e| e.user_id == user_id);
        if owned {
            table.rows.remove(&id);
        }
        Ok(owned)
    }

    async fn list(
        &self,
        user_id: i64,
        query: &ExpenseQuery,
    ) -> Result<(Vec<Expense>, u64), StoreError> {
        let table = lock(&self.expenses);
        let mut matching: Vec<&Expense> = table
            .rows
            .values()
            .filter(|e| e.user_id == user_id && query.filter.matches(e))
            .collect();
        matching.sort_by(|a, b| query.sort.compare(a, b));

        let total = matching.len() as u64;
        let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(query.page.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn category_totals(
        &self,
        user_id: i64,
        filter: &ExpenseFilter,
    ) -> Result<Vec<CategoryStat>, StoreError> {
        let table = lock(&self.expenses);
        let mut totals: BTreeMap<Category, CategoryStat> = BTreeMap::new();
        for e in table
            .rows
            .values()
            .filter(|e| e.user_id == user_id && filter.matches(e))
        {
            let stat = totals.entry(e.category).or_insert_with(|| CategoryStat {
                category: e.category,
                count: 0,
                total_amount: Default::default(),
            });
            stat.count += 1;
            stat.total_amount += e.amount;
        }
        Ok(totals.into_values().collect())
    }
}
