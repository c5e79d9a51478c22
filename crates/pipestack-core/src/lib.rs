//! pipestack-core: declaration model for CloudFormation stacks.
//!
//! # Components
//!
//! - **`stack`**: `Stack` / `Scope`: declare resources, detect collisions, synthesize templates
//! - **`resource`**: typed resource descriptors (Lambda, CodeDeploy, CloudWatch, IAM, ECR, SSM)
//! - **`iam`**: policy documents and statements
//! - **`expr`**: literals and intrinsic functions (`Ref`, `Fn::GetAtt`)
//! - **`arn`**: ARN parsing and ECR image URIs

pub mod arn;
pub mod error;
pub mod expr;
pub mod iam;
pub mod resource;
pub mod stack;

pub use arn::Arn;
pub use error::{DeclareError, DeclareResult};
pub use expr::Expr;
pub use iam::{Conditions, Effect, PolicyDocument, PolicyStatement, Principal};
pub use resource::{DeletionPolicy, Resource, ResourceProperties};
pub use stack::{ResourceRef, Scope, Stack, StackEnv, logical_id};
