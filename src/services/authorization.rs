use crate::error::AppError;
use crate::models::{Item, User};

/// 所有者チェック（更新・削除のみ対象）
///
/// 読み取りは認証済みであれば誰でも可能。
pub fn authorize_owner(principal: &User, item: &Item) -> Result<(), AppError> {
    if item.owner_id != principal.id {
        tracing::warn!(
            user_id = %principal.id,
            item_id = %item.id,
            owner_id = %item.owner_id,
            "所有者以外による変更操作を拒否"
        );
        return Err(AppError::Forbidden);
    }
    Ok(())
}
