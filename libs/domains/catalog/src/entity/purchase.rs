use sea_orm::entity::prelude::*;

/// Sea-ORM entity for the purchases table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_price: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    PurchaseItem,
}

impl Related<super::purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Build the domain purchase from the row plus its loaded lines.
    pub fn into_purchase(
        self,
        lines: Vec<crate::models::PurchaseLine>,
    ) -> crate::models::Purchase {
        crate::models::Purchase {
            id: self.id,
            total_price: self.total_price,
            lines,
            created_at: self.created_at.into(),
            updated_at: self.updated_at.into(),
        }
    }
}
