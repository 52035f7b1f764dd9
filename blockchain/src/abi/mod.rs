// Third party imports
use ethers::contract::abigen;

// Binding tối thiểu cho ERC-20 / BEP-20, chỉ các hàm đọc
abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);
