//! Query and update operators, and which field types each one applies to.

use crate::model::FieldType;

/// How a query operator's operand is treated before it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Cast with the field's cast function
    Cast,
    /// Array operand, every element cast
    CastEach,
    /// Passed through untouched
    Unchanged,
    /// `{from, minDistance?, maxDistance?}` rewritten into a `$geometry`
    NearSphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
    In,
    Nin,
    All,
    Exists,
    Regex,
    Options,
    NearSphere,
    ElemMatch,
}

impl QueryOperator {
    pub const ALL: [QueryOperator; 14] = [
        QueryOperator::Gt,
        QueryOperator::Lt,
        QueryOperator::Gte,
        QueryOperator::Lte,
        QueryOperator::Eq,
        QueryOperator::Ne,
        QueryOperator::In,
        QueryOperator::Nin,
        QueryOperator::All,
        QueryOperator::Exists,
        QueryOperator::Regex,
        QueryOperator::Options,
        QueryOperator::NearSphere,
        QueryOperator::ElemMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperator::Gt => "$gt",
            QueryOperator::Lt => "$lt",
            QueryOperator::Gte => "$gte",
            QueryOperator::Lte => "$lte",
            QueryOperator::Eq => "$eq",
            QueryOperator::Ne => "$ne",
            QueryOperator::In => "$in",
            QueryOperator::Nin => "$nin",
            QueryOperator::All => "$all",
            QueryOperator::Exists => "$exists",
            QueryOperator::Regex => "$regex",
            QueryOperator::Options => "$options",
            QueryOperator::NearSphere => "$nearSphere",
            QueryOperator::ElemMatch => "$elemMatch",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// The legality matrix. Any pair not listed here is rejected.
    pub fn supports(&self, field_type: FieldType) -> bool {
        use FieldType::*;
        match self {
            QueryOperator::Gt | QueryOperator::Lt | QueryOperator::Gte | QueryOperator::Lte => {
                matches!(field_type, String | Number | Boolean | Date | ObjectId)
            }
            QueryOperator::Eq | QueryOperator::Ne => field_type != GeoPoint,
            QueryOperator::In | QueryOperator::Nin | QueryOperator::All => {
                matches!(field_type, String | Number | Boolean | Date | ObjectId)
            }
            QueryOperator::Exists => true,
            QueryOperator::Regex | QueryOperator::Options => field_type == String,
            QueryOperator::NearSphere => field_type == GeoPoint,
            QueryOperator::ElemMatch => field_type == Array,
        }
    }

    pub fn operand(&self) -> Operand {
        match self {
            QueryOperator::Gt
            | QueryOperator::Lt
            | QueryOperator::Gte
            | QueryOperator::Lte
            | QueryOperator::Eq
            | QueryOperator::Ne => Operand::Cast,
            QueryOperator::In | QueryOperator::Nin | QueryOperator::All => Operand::CastEach,
            QueryOperator::Exists
            | QueryOperator::Regex
            | QueryOperator::Options
            | QueryOperator::ElemMatch => Operand::Unchanged,
            QueryOperator::NearSphere => Operand::NearSphere,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    Set,
    Unset,
    Inc,
    Mul,
    CurrentDate,
    Push,
    Pull,
    AddToSet,
    SetOnInsert,
}

impl UpdateOperator {
    pub const ALL: [UpdateOperator; 9] = [
        UpdateOperator::Set,
        UpdateOperator::Unset,
        UpdateOperator::Inc,
        UpdateOperator::Mul,
        UpdateOperator::CurrentDate,
        UpdateOperator::Push,
        UpdateOperator::Pull,
        UpdateOperator::AddToSet,
        UpdateOperator::SetOnInsert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::Unset => "$unset",
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Mul => "$mul",
            UpdateOperator::CurrentDate => "$currentDate",
            UpdateOperator::Push => "$push",
            UpdateOperator::Pull => "$pull",
            UpdateOperator::AddToSet => "$addToSet",
            UpdateOperator::SetOnInsert => "$setOnInsert",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// `$unset` and `$currentDate` carry flags, not field values.
    pub fn casts_values(&self) -> bool {
        !matches!(self, UpdateOperator::Unset | UpdateOperator::CurrentDate)
    }

    /// Whether a field of `field_type` may appear in this operator's block
    /// of a generated update schema.
    pub fn accepts(&self, field_type: FieldType) -> bool {
        match self {
            UpdateOperator::Set | UpdateOperator::SetOnInsert | UpdateOperator::Unset => true,
            UpdateOperator::Inc | UpdateOperator::Mul => field_type == FieldType::Number,
            UpdateOperator::CurrentDate => field_type == FieldType::Date,
            UpdateOperator::Push | UpdateOperator::Pull | UpdateOperator::AddToSet => {
                field_type == FieldType::Array
            }
        }
    }
}
