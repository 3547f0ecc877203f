//! Domain identifiers (strongly-typed IDs).
//!
//! # Phantom Type パターン
//! ホスト側ストアの ID はすべて文字列ですが、`Id<T>` のマーカー型で
//! ProjectId / TaskId / SpecId をコンパイル時に区別します。
//! spec_id を task_id の位置に渡すようなミスは型エラーになります。
//!
//! インメモリ実装やデモでは ULID から新しい ID を生成できます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// `generate()` で使うプレフィックス（例: "project-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// 中身はストアが返した文字列そのもの。`T` は PhantomData なので
/// 実行時のコストはありません。
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// ULID ベースの新しい ID を生成（インメモリ用）
    pub fn generate() -> Self {
        Self::new(format!("{}{}", T::prefix(), Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

// derive だと `T: Clone` などの境界が付いてしまうため手書きする
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Project のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Project {}

impl IdMarker for Project {
    fn prefix() -> &'static str {
        "project-"
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Spec のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Spec {}

impl IdMarker for Spec {
    fn prefix() -> &'static str {
        "spec-"
    }
}

/// Identifier of a project (one git repository under management).
pub type ProjectId = Id<Project>;

/// Identifier of a task inside a project.
pub type TaskId = Id<Task>;

/// Identifier of the spec directory a task executes.
pub type SpecId = Id<Spec>;
