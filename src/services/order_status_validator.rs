// src/services/order_status_validator.rs

use serde_json::Value;

use crate::{
    common::error::AppError,
    models::auth::{CurrentUser, UserRole},
    models::catalog::Merchant,
    models::order::{Order, OrderStatus},
};

/// Componente puro de decisão: dado o status corrente, o papel do ator e o
/// status pedido, responde se a transição é legal e quais dados extras ela
/// exige. Nunca toca a persistência; o motor de transições o consulta antes
/// de toda mudança, e os clientes podem consultá-lo para renderizar ações.
#[derive(Clone, Default)]
pub struct OrderStatusValidatorService;

impl OrderStatusValidatorService {
    pub fn new() -> Self {
        Self
    }

    /// Valida grafo, permissão por papel e regras de negócio, nesta ordem.
    pub fn validate_transition(
        &self,
        order: &Order,
        merchant: &Merchant,
        to: OrderStatus,
        actor: &CurrentUser,
    ) -> Result<(), AppError> {
        // 1. Aresta existe no grafo?
        if !order.status.can_transition_to(to) {
            return Err(AppError::InvalidStatusTransition {
                from: order.status,
                to,
            });
        }

        // 2. O ator pode fazer esta transição?
        self.validate_actor(order, merchant, to, actor)?;

        // 3. Regras de negócio
        if order.status == OrderStatus::Pending
            && to == OrderStatus::Confirmed
            && !merchant.is_active
        {
            return Err(AppError::MerchantInactive);
        }

        Ok(())
    }

    /// Permissão por papel, independente do grafo. Também usada pelo
    /// rollback, que anda contra as arestas.
    pub fn validate_actor(
        &self,
        order: &Order,
        merchant: &Merchant,
        to: OrderStatus,
        actor: &CurrentUser,
    ) -> Result<(), AppError> {
        match actor.role {
            UserRole::Admin => Ok(()),

            UserRole::MerchantOwner => {
                if merchant.owner_id != actor.id {
                    return Err(AppError::AccessDenied);
                }
                match to {
                    OrderStatus::Confirmed
                    | OrderStatus::Preparing
                    | OrderStatus::Ready
                    | OrderStatus::Cancelled => Ok(()),
                    other => Err(AppError::RoleNotPermitted(format!(
                        "Merchant não pode alterar o status para {other:?}"
                    ))),
                }
            }

            UserRole::Courier => {
                if !matches!(
                    to,
                    OrderStatus::PickedUp | OrderStatus::OnTheWay | OrderStatus::Delivered
                ) {
                    return Err(AppError::RoleNotPermitted(format!(
                        "Entregador não pode alterar o status para {to:?}"
                    )));
                }
                match order.courier_id {
                    // Pedido de outro entregador
                    Some(assigned) if assigned != actor.id => Err(AppError::AccessDenied),
                    // A retirada atribui o pedido ao entregador que a fez
                    None if to != OrderStatus::PickedUp => Err(AppError::RoleNotPermitted(
                        "Pedido ainda não atribuído a um entregador".to_string(),
                    )),
                    _ => Ok(()),
                }
            }

            UserRole::Customer => {
                if order.user_id != actor.id {
                    return Err(AppError::AccessDenied);
                }
                if to != OrderStatus::Cancelled {
                    return Err(AppError::RoleNotPermitted(
                        "Cliente só pode cancelar pedidos".to_string(),
                    ));
                }
                // Depois que o preparo começa, o cancelamento passa a ser
                // do merchant ou do suporte
                if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
                    return Err(AppError::RoleNotPermitted(
                        "O pedido não pode mais ser cancelado pelo cliente".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Sucessores legais no grafo, filtrados pela política de papel.
    pub fn valid_next_statuses(
        &self,
        order: &Order,
        merchant: &Merchant,
        actor: &CurrentUser,
    ) -> Vec<OrderStatus> {
        order
            .status
            .valid_transitions()
            .iter()
            .copied()
            .filter(|to| self.validate_transition(order, merchant, *to, actor).is_ok())
            .collect()
    }

    /// Campos extras que uma transição exige do chamador.
    pub fn required_transition_data(
        &self,
        from: OrderStatus,
        to: OrderStatus,
    ) -> &'static [&'static str] {
        match (from, to) {
            (_, OrderStatus::Cancelled) => &["cancellationReason"],
            (OrderStatus::Pending, OrderStatus::Confirmed) => &["estimatedPreparationTime"],
            (OrderStatus::PickedUp, OrderStatus::OnTheWay) => &["estimatedDeliveryTime"],
            _ => &[],
        }
    }

    /// Falha com o primeiro campo obrigatório ausente (ou nulo).
    pub fn ensure_required_data(
        &self,
        from: OrderStatus,
        to: OrderStatus,
        data: Option<&Value>,
    ) -> Result<(), AppError> {
        for field in self.required_transition_data(from, to) {
            let present = data
                .and_then(|d| d.get(*field))
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if !present {
                return Err(AppError::MissingTransitionData((*field).to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    fn merchant(owner_id: Uuid, is_active: bool) -> Merchant {
        Merchant {
            id: Uuid::new_v4(),
            owner_id,
            name: "Mercado Central".to_string(),
            is_active,
            minimum_order_amount: Decimal::new(10000, 2),
            delivery_fee: Decimal::new(500, 2),
            average_delivery_time: 30,
            created_at: Utc::now(),
        }
    }

    fn order(user_id: Uuid, merchant_id: Uuid, status: OrderStatus) -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-20260101-ABCD1234".to_string(),
            user_id,
            merchant_id,
            courier_id: None,
            status,
            sub_total: Decimal::new(15000, 2),
            delivery_fee: Decimal::new(500, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(15500, 2),
            payment_method: "Card".to_string(),
            payment_status: "Pending".to_string(),
            delivery_address: "Rua das Flores, 100".to_string(),
            delivery_latitude: Decimal::new(-23_550_520, 6),
            delivery_longitude: Decimal::new(-46_633_308, 6),
            estimated_delivery_time: None,
            actual_delivery_time: None,
            cancellation_reason: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn actor(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn illegal_edge_is_rejected_even_for_admin() {
        let validator = OrderStatusValidatorService::new();
        let m = merchant(Uuid::new_v4(), true);
        let o = order(Uuid::new_v4(), m.id, OrderStatus::Pending);
        let admin = actor(UserRole::Admin);

        // Pending -> Delivered não tem aresta direta
        let err = validator
            .validate_transition(&o, &m, OrderStatus::Delivered, &admin)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
    }

    #[test]
    fn every_legal_edge_is_accepted_for_admin() {
        let validator = OrderStatusValidatorService::new();
        let m = merchant(Uuid::new_v4(), true);
        let admin = actor(UserRole::Admin);

        for from in OrderStatus::ALL {
            for to in from.valid_transitions() {
                let o = order(Uuid::new_v4(), m.id, from);
                assert!(
                    validator.validate_transition(&o, &m, *to, &admin).is_ok(),
                    "aresta legal {from:?} -> {to:?} recusada"
                );
            }
        }
    }

    #[test]
    fn customer_can_cancel_pending_but_not_deliver() {
        let validator = OrderStatusValidatorService::new();
        let m = merchant(Uuid::new_v4(), true);
        let customer = actor(UserRole::Customer);
        let o = order(customer.id, m.id, OrderStatus::Pending);

        assert!(
            validator
                .validate_transition(&o, &m, OrderStatus::Cancelled, &customer)
                .is_ok()
        );
        // sem aresta Pending -> Delivered: rejeitado antes da política de papel
        assert!(
            validator
                .validate_transition(&o, &m, OrderStatus::Delivered, &customer)
                .is_err()
        );
        // aresta legal, mas papel não permitido
        let err = validator
            .validate_transition(&o, &m, OrderStatus::Confirmed, &customer)
            .unwrap_err();
        assert_eq!(err.error_code(), "ROLE_NOT_PERMITTED");
    }

    #[test]
    fn customer_cannot_cancel_once_preparing() {
        let validator = OrderStatusValidatorService::new();
        let m = merchant(Uuid::new_v4(), true);
        let customer = actor(UserRole::Customer);
        let o = order(customer.id, m.id, OrderStatus::Preparing);

        let err = validator
            .validate_transition(&o, &m, OrderStatus::Cancelled, &customer)
            .unwrap_err();
        assert_eq!(err.error_code(), "ROLE_NOT_PERMITTED");
    }

    #[test]
    fn customer_cannot_touch_someone_elses_order() {
        let validator = OrderStatusValidatorService::new();
        let m = merchant(Uuid::new_v4(), true);
        let o = order(Uuid::new_v4(), m.id, OrderStatus::Pending);
        let stranger = actor(UserRole::Customer);

        let err = validator
            .validate_transition(&o, &m, OrderStatus::Cancelled, &stranger)
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCESS_DENIED");
    }

    #[test]
    fn merchant_owner_confirms_only_his_own_orders() {
        let validator = OrderStatusValidatorService::new();
        let owner = actor(UserRole::MerchantOwner);
        let m = merchant(owner.id, true);
        let o = order(Uuid::new_v4(), m.id, OrderStatus::Pending);

        assert!(
            validator
                .validate_transition(&o, &m, OrderStatus::Confirmed, &owner)
                .is_ok()
        );

        let impostor = actor(UserRole::MerchantOwner);
        let err = validator
            .validate_transition(&o, &m, OrderStatus::Confirmed, &impostor)
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCESS_DENIED");
    }

    #[test]
    fn inactive_merchant_cannot_confirm() {
        let validator = OrderStatusValidatorService::new();
        let owner = actor(UserRole::MerchantOwner);
        let m = merchant(owner.id, false);
        let o = order(Uuid::new_v4(), m.id, OrderStatus::Pending);

        let err = validator
            .validate_transition(&o, &m, OrderStatus::Confirmed, &owner)
            .unwrap_err();
        assert_eq!(err.error_code(), "MERCHANT_INACTIVE");
    }

    #[test]
    fn courier_claims_at_pickup_and_keeps_the_order() {
        let validator = OrderStatusValidatorService::new();
        let m = merchant(Uuid::new_v4(), true);
        let courier = actor(UserRole::Courier);

        // Retirada de pedido ainda não atribuído: permitida
        let ready = order(Uuid::new_v4(), m.id, OrderStatus::Ready);
        assert!(
            validator
                .validate_transition(&ready, &m, OrderStatus::PickedUp, &courier)
                .is_ok()
        );

        // Depois de atribuído, outro entregador não mexe
        let mut picked = order(Uuid::new_v4(), m.id, OrderStatus::PickedUp);
        picked.courier_id = Some(courier.id);
        let other = actor(UserRole::Courier);
        let err = validator
            .validate_transition(&picked, &m, OrderStatus::OnTheWay, &other)
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCESS_DENIED");

        // O entregador atribuído segue o fluxo
        assert!(
            validator
                .validate_transition(&picked, &m, OrderStatus::OnTheWay, &courier)
                .is_ok()
        );
    }

    #[test]
    fn valid_next_statuses_filters_by_role() {
        let validator = OrderStatusValidatorService::new();
        let owner = actor(UserRole::MerchantOwner);
        let m = merchant(owner.id, true);
        let o = order(Uuid::new_v4(), m.id, OrderStatus::Pending);

        // dono do merchant: confirmar ou cancelar
        let next = validator.valid_next_statuses(&o, &m, &owner);
        assert_eq!(next, vec![OrderStatus::Confirmed, OrderStatus::Cancelled]);

        // cliente dono do pedido: só cancelar
        let customer = CurrentUser {
            id: o.user_id,
            role: UserRole::Customer,
        };
        let next = validator.valid_next_statuses(&o, &m, &customer);
        assert_eq!(next, vec![OrderStatus::Cancelled]);

        // estados terminais não têm sucessores para ninguém
        let delivered = order(Uuid::new_v4(), m.id, OrderStatus::Delivered);
        let admin = actor(UserRole::Admin);
        assert!(validator.valid_next_statuses(&delivered, &m, &admin).is_empty());
    }

    #[test]
    fn required_data_per_transition() {
        let validator = OrderStatusValidatorService::new();

        assert_eq!(
            validator.required_transition_data(OrderStatus::Pending, OrderStatus::Confirmed),
            &["estimatedPreparationTime"][..]
        );
        assert_eq!(
            validator.required_transition_data(OrderStatus::PickedUp, OrderStatus::OnTheWay),
            &["estimatedDeliveryTime"][..]
        );
        // qualquer transição para Cancelled exige o motivo
        for from in OrderStatus::ALL {
            if from.can_transition_to(OrderStatus::Cancelled) {
                assert_eq!(
                    validator.required_transition_data(from, OrderStatus::Cancelled),
                    &["cancellationReason"][..]
                );
            }
        }
        assert!(
            validator
                .required_transition_data(OrderStatus::Confirmed, OrderStatus::Preparing)
                .is_empty()
        );
    }

    #[test]
    fn ensure_required_data_rejects_missing_or_null() {
        let validator = OrderStatusValidatorService::new();

        let err = validator
            .ensure_required_data(OrderStatus::Pending, OrderStatus::Confirmed, None)
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_TRANSITION_DATA");

        let null_data = json!({ "estimatedPreparationTime": null });
        assert!(
            validator
                .ensure_required_data(
                    OrderStatus::Pending,
                    OrderStatus::Confirmed,
                    Some(&null_data)
                )
                .is_err()
        );

        let ok_data = json!({ "estimatedPreparationTime": 20 });
        assert!(
            validator
                .ensure_required_data(
                    OrderStatus::Pending,
                    OrderStatus::Confirmed,
                    Some(&ok_data)
                )
                .is_ok()
        );
    }
}
